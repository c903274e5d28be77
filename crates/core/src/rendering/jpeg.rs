use image::codecs::jpeg::JpegEncoder;
use image::ImageError;

use crate::rendering::overlay::{placeholder, Placeholder};
use crate::shared::frame::Frame;

pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, ImageError> {
    let img = frame.to_rgb_image().ok_or_else(|| {
        ImageError::Parameter(image::error::ParameterError::from_kind(
            image::error::ParameterErrorKind::DimensionMismatch,
        ))
    })?;
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality).encode_image(&img)?;
    Ok(bytes)
}

/// Encodes `frame`, substituting the encoding-error placeholder on failure.
pub fn encode_jpeg_or_placeholder(frame: &Frame, quality: u8) -> Vec<u8> {
    match encode_jpeg(frame, quality) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("JPEG encoding failed, serving placeholder: {e}");
            encode_jpeg(&placeholder(Placeholder::EncodingError), quality).unwrap_or_else(|e| {
                log::error!("Placeholder encoding failed: {e}");
                Vec::new()
            })
        }
    }
}
