/// YOLO face detector using ONNX Runtime via `ort`.
///
/// The accurate backend. Handles letterbox preprocessing, inference and NMS.
/// Keypoints in the output rows, if present, are ignored.
use std::path::Path;

use crate::detection::domain::face_detector::{DetectionParams, FaceDetector};
use crate::shared::face_rect::FaceRect;
use crate::shared::frame::Frame;

use super::execution_provider::load_session;
use super::math::{nms, to_face_rects, RawDetection};

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        params: &DetectionParams,
    ) -> Result<Vec<FaceRect>, Box<dyn std::error::Error>> {
        let fw = frame.width();
        let fh = frame.height();

        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let lb = Letterbox {
            scale,
            pad_x: pad_x as f64,
            pad_y: pad_y as f64,
        };
        let mut raw_dets = parse_rows(data, &shape, params.confidence, &lb);
        let kept = nms(&mut raw_dets, NMS_IOU_THRESH);
        Ok(to_face_rects(&kept, params.min_face_size, fw, fh))
    }
}

struct Letterbox {
    scale: f64,
    pad_x: f64,
    pad_y: f64,
}

/// Parses `[cx, cy, w, h, conf, ...]` rows from a `[1, A, B]` output.
///
/// YOLO exports either `[1, features, detections]` or the transpose; the
/// smaller axis is taken as the feature axis.
fn parse_rows(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    letterbox: &Letterbox,
) -> Vec<RawDetection> {
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 {
        return Vec::new();
    }

    let value = |det: usize, feat: usize| -> f64 {
        let idx = if transposed {
            feat * num_dets + det
        } else {
            det * num_feats + feat
        };
        data[idx] as f64
    };

    let mut dets = Vec::new();
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        dets.push(RawDetection {
            x1: ((cx - w / 2.0) - letterbox.pad_x) / letterbox.scale,
            y1: ((cy - h / 2.0) - letterbox.pad_y) / letterbox.scale,
            x2: ((cx + w / 2.0) - letterbox.pad_x) / letterbox.scale,
            y2: ((cy + h / 2.0) - letterbox.pad_y) / letterbox.scale,
            score: conf,
        });
    }
    dets
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding is 114/255 gray, YOLO convention.
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → 640: scale 3.2, new 640x320, pad_y 160
        let frame = Frame::filled(200, 100, [128, 128, 128]);
        let (tensor, scale, pad_x, pad_y) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert!((scale - 3.2).abs() < 0.01);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 160);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = Frame::filled(100, 50, [255, 255, 255]);
        let (tensor, _, pad_x, pad_y) = letterbox(&frame, 640);

        let y = pad_y as usize + 1;
        let x = pad_x as usize + 1;
        assert!((tensor[[0, 0, y, x]] - 1.0).abs() < 0.01);
        assert!((tensor[[0, 0, 0, 0]] - 114.0 / 255.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_rows_row_major() {
        let identity = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        // Six detections × 5 features; only the first passes.
        let mut data = vec![0.0f32; 6 * 5];
        data[..5].copy_from_slice(&[100.0, 100.0, 40.0, 40.0, 0.9]);
        data[5..10].copy_from_slice(&[300.0, 300.0, 40.0, 40.0, 0.1]);
        let dets = parse_rows(&data, &[1, 6, 5], 0.5, &identity);
        assert_eq!(dets.len(), 1);
        assert!((dets[0].x1 - 80.0).abs() < 1e-9);
        assert!((dets[0].y2 - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rows_transposed_and_unletterboxed() {
        let lb = Letterbox {
            scale: 2.0,
            pad_x: 0.0,
            pad_y: 20.0,
        };
        // 5 features × 6 detections; only detection 0 is populated.
        let mut data = vec![0.0f32; 5 * 6];
        data[0] = 100.0; // cx
        data[6] = 120.0; // cy
        data[12] = 40.0; // w
        data[18] = 40.0; // h
        data[24] = 0.8; // conf
        let dets = parse_rows(&data, &[1, 5, 6], 0.5, &lb);
        assert_eq!(dets.len(), 1);
        assert!((dets[0].x1 - 40.0).abs() < 1e-9);
        assert!((dets[0].y1 - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rows_too_few_features() {
        let identity = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        assert!(parse_rows(&[0.0; 4], &[1, 1, 4], 0.0, &identity).is_empty());
    }
}
