use serde::Serialize;

use crate::shared::emotion::{Emotion, EmotionVector};
use crate::shared::face_rect::FaceRect;

/// One tracked face and its smoothed emotion distribution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FaceObservation {
    #[serde(serialize_with = "serialize_rect")]
    pub rect: FaceRect,
    pub emotions: EmotionVector,
}

impl FaceObservation {
    pub fn new(rect: FaceRect, emotions: EmotionVector) -> Self {
        Self { rect, emotions }
    }

    pub fn dominant(&self) -> Emotion {
        self.emotions.dominant()
    }
}

fn serialize_rect<S: serde::Serializer>(rect: &FaceRect, s: S) -> Result<S::Ok, S::Error> {
    [rect.x, rect.y, rect.width, rect.height].serialize(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_rect_as_xywh() {
        let obs = FaceObservation::new(FaceRect::new(1, 2, 3, 4), EmotionVector::neutral());
        let json = serde_json::to_value(obs).unwrap();
        assert_eq!(json["rect"], serde_json::json!([1, 2, 3, 4]));
        assert_eq!(json["emotions"]["neutral"], 1.0);
        assert_eq!(obs.dominant(), Emotion::Neutral);
    }
}
