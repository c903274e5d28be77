use image::RgbImage;
use ndarray::{ArrayView3, ArrayViewMut3};

use crate::shared::face_rect::FaceRect;

/// A single camera frame: contiguous RGB bytes in row-major order.
///
/// Pixel format conversion happens at the camera and encoder boundaries;
/// everything in between treats frames as packed RGB24.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    sequence: u64,
}

pub const CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            sequence,
        }
    }

    /// Solid-colour frame, used for placeholders and tests.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self::new(data, width, height, 0)
    }

    pub fn from_rgb_image(image: RgbImage, sequence: u64) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, sequence)
    }

    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Capture order of this frame within its stream, starting at 1.
    /// Placeholders carry 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels under `rect` into a new frame.
    ///
    /// The rectangle is clamped to the frame; returns `None` when nothing
    /// of it lies inside.
    pub fn crop(&self, rect: &FaceRect) -> Option<Frame> {
        let clamped = rect.clamp_to(self.width, self.height)?;
        let (x, y) = (clamped.x as usize, clamped.y as usize);
        let (w, h) = (clamped.width as usize, clamped.height as usize);
        let stride = self.width as usize * CHANNELS;

        let mut data = Vec::with_capacity(w * h * CHANNELS);
        for row in y..y + h {
            let start = row * stride + x * CHANNELS;
            data.extend_from_slice(&self.data[start..start + w * CHANNELS]);
        }
        Some(Frame::new(data, w as u32, h as u32, self.sequence))
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, CHANNELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.sequence(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * 3")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 0);
    }

    #[test]
    fn test_filled_sets_every_pixel() {
        let frame = Frame::filled(3, 2, [10, 20, 30]);
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[2, 3, 3]);
        assert_eq!(arr[[1, 2, 0]], 10);
        assert_eq!(arr[[1, 2, 1]], 20);
        assert_eq!(arr[[1, 2, 2]], 30);
    }

    #[test]
    fn test_rgb_image_conversion_keeps_pixels() {
        let mut frame = Frame::filled(4, 4, [0, 0, 0]);
        frame.as_ndarray_mut()[[2, 1, 0]] = 200;
        let image = frame.to_rgb_image().unwrap();
        assert_eq!(image.get_pixel(1, 2).0, [200, 0, 0]);

        let back = Frame::from_rgb_image(image, 9);
        assert_eq!(back.data(), frame.data());
        assert_eq!(back.sequence(), 9);
    }

    #[test]
    fn test_crop_copies_region() {
        let mut frame = Frame::filled(10, 10, [0, 0, 0]);
        frame.as_ndarray_mut()[[3, 4, 1]] = 77;
        let crop = frame.crop(&FaceRect::new(4, 3, 2, 2)).unwrap();
        assert_eq!(crop.width(), 2);
        assert_eq!(crop.height(), 2);
        assert_eq!(crop.as_ndarray()[[0, 0, 1]], 77);
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = Frame::filled(10, 10, [1, 1, 1]);
        let crop = frame.crop(&FaceRect::new(8, 8, 5, 5)).unwrap();
        assert_eq!((crop.width(), crop.height()), (2, 2));
    }

    #[test]
    fn test_crop_outside_frame_is_none() {
        let frame = Frame::filled(10, 10, [1, 1, 1]);
        assert!(frame.crop(&FaceRect::new(20, 20, 5, 5)).is_none());
    }
}
