//! Annotations drawn onto processed frames.
//!
//! Drawing is approximate: boxes, bars and banners only, no text.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::shared::constants::{CAPTURE_HEIGHT, CAPTURE_WIDTH};
use crate::shared::emotion::Emotion;
use crate::shared::frame::Frame;
use crate::shared::observation::FaceObservation;

const BOX_THICKNESS: i32 = 2;
const BANNER_HEIGHT: u32 = 24;
const METER_BAR_HEIGHT: u32 = 8;
const METER_BAR_GAP: u32 = 3;
const METER_WIDTH: u32 = 120;
const METER_MARGIN: u32 = 10;

const BANNER_RED: Rgb<u8> = Rgb([200, 30, 30]);
const METER_TRACK: Rgb<u8> = Rgb([40, 40, 40]);

/// Why a processed frame carries a status banner instead of observations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    NoFace,
    ProcessingError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholder {
    /// Nothing has been published yet.
    NoFeed,
    /// The requested frame could not be encoded.
    EncodingError,
}

/// Draws one box per face, coloured by its dominant emotion, and an
/// emotion meter for the first face.
pub fn annotate(frame: &Frame, observations: &[FaceObservation]) -> Frame {
    let Some(mut img) = frame.to_rgb_image() else {
        return frame.clone();
    };
    for obs in observations {
        draw_face_box(&mut img, obs);
    }
    if let Some(first) = observations.first() {
        draw_meter(&mut img, first);
    }
    Frame::from_rgb_image(img, frame.sequence())
}

/// Copies `frame` with a red banner across the top.
pub fn with_status(frame: &Frame, status: Status) -> Frame {
    let Some(mut img) = frame.to_rgb_image() else {
        return frame.clone();
    };
    let height = match status {
        Status::NoFace => BANNER_HEIGHT,
        Status::ProcessingError => BANNER_HEIGHT * 2,
    };
    draw_banner(&mut img, height);
    Frame::from_rgb_image(img, frame.sequence())
}

/// Fixed-size stand-in image. Sequence number 0 marks it as synthetic.
pub fn placeholder(kind: Placeholder) -> Frame {
    let mut img = RgbImage::from_pixel(CAPTURE_WIDTH, CAPTURE_HEIGHT, Rgb([32, 32, 32]));
    match kind {
        Placeholder::NoFeed => {
            let band = Rect::at(0, (CAPTURE_HEIGHT / 2 - 20) as i32).of_size(CAPTURE_WIDTH, 40);
            draw_filled_rect_mut(&mut img, band, Rgb([90, 90, 90]));
        }
        Placeholder::EncodingError => draw_banner(&mut img, CAPTURE_HEIGHT / 6),
    }
    Frame::from_rgb_image(img, 0)
}

fn draw_face_box(img: &mut RgbImage, obs: &FaceObservation) {
    let color = Rgb(obs.dominant().color());
    let r = obs.rect;
    for inset in 0..BOX_THICKNESS {
        let w = r.width - 2 * inset;
        let h = r.height - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(r.x + inset, r.y + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(img, rect, color);
    }
}

/// One horizontal bar per label, bottom-left, length proportional to probability.
fn draw_meter(img: &mut RgbImage, obs: &FaceObservation) {
    let rows = Emotion::COUNT as u32;
    let meter_height = rows * (METER_BAR_HEIGHT + METER_BAR_GAP);
    if img.height() < meter_height + METER_MARGIN || img.width() < METER_WIDTH + METER_MARGIN {
        return;
    }
    let top = img.height() - METER_MARGIN - meter_height;

    for (row, (emotion, p)) in obs.emotions.iter().enumerate() {
        let y = (top + row as u32 * (METER_BAR_HEIGHT + METER_BAR_GAP)) as i32;
        let track = Rect::at(METER_MARGIN as i32, y).of_size(METER_WIDTH, METER_BAR_HEIGHT);
        draw_filled_rect_mut(img, track, METER_TRACK);

        let filled = (p.clamp(0.0, 1.0) * METER_WIDTH as f64) as u32;
        if filled > 0 {
            let bar = Rect::at(METER_MARGIN as i32, y).of_size(filled, METER_BAR_HEIGHT);
            draw_filled_rect_mut(img, bar, Rgb(emotion.color()));
        }
    }
}

fn draw_banner(img: &mut RgbImage, height: u32) {
    let height = height.min(img.height());
    if height == 0 || img.width() == 0 {
        return;
    }
    let band = Rect::at(0, 0).of_size(img.width(), height);
    draw_filled_rect_mut(img, band, BANNER_RED);
}
