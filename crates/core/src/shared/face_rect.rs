/// Axis-aligned face bounding box in source-frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rect from corner coordinates, truncating toward zero.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1 as i32, y1 as i32, (x2 - x1) as i32, (y2 - y1) as i32)
    }

    /// Integer center point, matching `x + w / 2` pixel arithmetic.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn center_distance(&self, other: &FaceRect) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        let dx = (ax - bx) as f64;
        let dy = (ay - by) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Componentwise `current_weight * self + previous_weight * previous`,
    /// truncated toward zero.
    pub fn blend(&self, previous: &FaceRect, current_weight: f64, previous_weight: f64) -> FaceRect {
        let mix = |current: i32, prev: i32| -> i32 {
            (current_weight * current as f64 + previous_weight * prev as f64) as i32
        };
        FaceRect {
            x: mix(self.x, previous.x),
            y: mix(self.y, previous.y),
            width: mix(self.width, previous.width),
            height: mix(self.height, previous.height),
        }
    }

    /// Grows the rect by `ratio` of its size on every side.
    pub fn expand(&self, ratio: f64) -> FaceRect {
        let mx = (self.width as f64 * ratio) as i32;
        let my = (self.height as f64 * ratio) as i32;
        FaceRect {
            x: self.x - mx,
            y: self.y - my,
            width: self.width + 2 * mx,
            height: self.height + 2 * my,
        }
    }

    /// Intersection with a `frame_w × frame_h` frame, or `None` if empty.
    pub fn clamp_to(&self, frame_w: u32, frame_h: u32) -> Option<FaceRect> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = (self.x + self.width).min(frame_w as i32);
        let y2 = (self.y + self.height).min(frame_h as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(FaceRect::new(x1, y1, x2 - x1, y2 - y1))
    }
}
