use serde::{Deserialize, Serialize, Serializer};

/// The closed set of emotion labels, in model output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl Emotion {
    pub const COUNT: usize = 7;

    pub const ALL: [Emotion; Emotion::COUNT] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Sad,
        Emotion::Surprise,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
        }
    }

    /// Overlay colour (RGB) for this emotion.
    pub fn color(self) -> [u8; 3] {
        match self {
            Emotion::Angry => [255, 0, 0],
            Emotion::Disgust => [255, 140, 0],
            Emotion::Fear => [255, 255, 0],
            Emotion::Happy => [0, 255, 0],
            Emotion::Neutral => [0, 255, 255],
            Emotion::Sad => [0, 0, 255],
            Emotion::Surprise => [255, 0, 255],
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Probability distribution over [`Emotion`] labels.
///
/// Every constructor that can produce arbitrary values goes through
/// [`EmotionVector::normalized`], so a vector handed out by the inferencer
/// or smoother is non-negative and sums to 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmotionVector {
    probs: [f64; Emotion::COUNT],
}

impl EmotionVector {
    /// All mass on `neutral`. Used as the inference fallback.
    pub fn neutral() -> Self {
        let mut probs = [0.0; Emotion::COUNT];
        probs[Emotion::Neutral.index()] = 1.0;
        Self { probs }
    }

    /// Wraps values as-is. Callers must uphold the distribution invariant.
    pub fn from_probs(probs: [f64; Emotion::COUNT]) -> Self {
        Self { probs }
    }

    /// Maps a raw model output onto the label set.
    ///
    /// Returns `None` when the output length does not match the label count.
    pub fn from_model_output(raw: &[f32]) -> Option<Self> {
        if raw.len() != Emotion::COUNT {
            return None;
        }
        let mut probs = [0.0; Emotion::COUNT];
        for (slot, &value) in probs.iter_mut().zip(raw) {
            *slot = value as f64;
        }
        Some(Self { probs })
    }

    pub fn get(&self, emotion: Emotion) -> f64 {
        self.probs[emotion.index()]
    }

    pub fn set(&mut self, emotion: Emotion, value: f64) {
        self.probs[emotion.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        Emotion::ALL.iter().map(|&e| (e, self.probs[e.index()]))
    }

    pub fn sum(&self) -> f64 {
        self.probs.iter().sum()
    }

    pub fn max_probability(&self) -> f64 {
        self.probs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Label with the highest probability; ties resolve to the earlier label.
    pub fn dominant(&self) -> Emotion {
        let mut best = Emotion::ALL[0];
        for (emotion, p) in self.iter() {
            if p > self.get(best) {
                best = emotion;
            }
        }
        best
    }

    /// Clamps negatives and non-finite values to zero and rescales to sum 1.
    ///
    /// A vector with no remaining mass collapses to [`EmotionVector::neutral`].
    pub fn normalized(mut self) -> Self {
        for p in self.probs.iter_mut() {
            if !p.is_finite() || *p < 0.0 {
                *p = 0.0;
            }
        }
        let total = self.sum();
        if total <= f64::EPSILON {
            return Self::neutral();
        }
        for p in self.probs.iter_mut() {
            *p /= total;
        }
        self
    }
}

impl Default for EmotionVector {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Serialize for EmotionVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|(e, p)| (e.label(), p)))
    }
}
