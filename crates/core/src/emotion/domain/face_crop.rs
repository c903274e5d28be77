use image::imageops::{self, FilterType};
use ndarray::Array4;

use crate::shared::constants::FACE_CROP_MARGIN;
use crate::shared::face_rect::FaceRect;
use crate::shared::frame::Frame;

/// Cuts a face out of `frame` with a margin on every side, clamped to the frame.
pub fn crop_face(frame: &Frame, rect: &FaceRect) -> Option<Frame> {
    frame.crop(&rect.expand(FACE_CROP_MARGIN))
}

/// Resizes a face crop to `size × size` and lays it out as a `[1, size, size, 3]`
/// batch with pixels mapped from `[0, 255]` to `[-1, 1]`.
pub fn to_model_input(face: &Frame, size: u32) -> Option<Array4<f32>> {
    let image = face.to_rgb_image()?;
    let resized = if image.dimensions() == (size, size) {
        image
    } else {
        imageops::resize(&image, size, size, FilterType::Triangle)
    };

    let s = size as usize;
    let pixels: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|p| p as f32 / 127.5 - 1.0)
        .collect();
    Array4::from_shape_vec((1, s, s, 3), pixels).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_crop_face_adds_margin() {
        let frame = Frame::filled(200, 200, [0, 0, 0]);
        let face = crop_face(&frame, &FaceRect::new(50, 50, 50, 50)).unwrap();
        assert_eq!((face.width(), face.height()), (70, 70));
    }

    #[test]
    fn test_crop_face_clamps_margin_at_edges() {
        let frame = Frame::filled(100, 100, [0, 0, 0]);
        let face = crop_face(&frame, &FaceRect::new(0, 0, 50, 50)).unwrap();
        assert_eq!((face.width(), face.height()), (60, 60));
    }

    #[test]
    fn test_crop_face_outside_frame() {
        let frame = Frame::filled(100, 100, [0, 0, 0]);
        assert!(crop_face(&frame, &FaceRect::new(300, 300, 20, 20)).is_none());
    }

    #[test]
    fn test_model_input_shape_and_scale() {
        let face = Frame::filled(40, 30, [255, 0, 0]);
        let input = to_model_input(&face, 96).unwrap();
        assert_eq!(input.shape(), &[1, 96, 96, 3]);
        assert_relative_eq!(input[[0, 10, 10, 0]], 1.0, epsilon = 1e-5);
        assert_relative_eq!(input[[0, 10, 10, 1]], -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_model_input_midgray_is_near_zero() {
        let face = Frame::filled(96, 96, [128, 128, 128]);
        let input = to_model_input(&face, 96).unwrap();
        assert!(input.iter().all(|v| v.abs() < 0.01));
    }
}
