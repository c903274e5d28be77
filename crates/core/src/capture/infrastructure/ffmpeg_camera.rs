use crate::capture::domain::camera::{CameraDevice, CameraSource, CaptureError};
use crate::shared::frame::Frame;

/// libavdevice demuxer used for local webcams on this platform.
#[cfg(target_os = "linux")]
const CAPTURE_FORMAT: &str = "v4l2";
#[cfg(target_os = "macos")]
const CAPTURE_FORMAT: &str = "avfoundation";
#[cfg(target_os = "windows")]
const CAPTURE_FORMAT: &str = "dshow";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const CAPTURE_FORMAT: &str = "v4l2";

/// Opens a local webcam through libavdevice at a fixed resolution.
#[derive(Debug, Clone)]
pub struct FfmpegCameraSource {
    device: String,
    width: u32,
    height: u32,
}

impl FfmpegCameraSource {
    pub fn new(device: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            device: device.into(),
            width,
            height,
        }
    }

    fn open_error(&self, reason: impl ToString) -> Box<dyn std::error::Error> {
        Box::new(CaptureError::Open {
            device: self.device.clone(),
            reason: reason.to_string(),
        })
    }
}

impl CameraSource for FfmpegCameraSource {
    fn open(&self) -> Result<Box<dyn CameraDevice>, Box<dyn std::error::Error>> {
        ffmpeg_next::init().map_err(|e| self.open_error(e))?;
        ffmpeg_next::device::register_all();

        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name().split(',').any(|n| n == CAPTURE_FORMAT))
            .ok_or_else(|| self.open_error(format!("{CAPTURE_FORMAT} input not available")))?;

        let mut options = ffmpeg_next::Dictionary::new();
        options.set("video_size", &format!("{}x{}", self.width, self.height));

        let ctx = ffmpeg_next::format::open_with(
            &self.device,
            &ffmpeg_next::format::Format::Input(format),
            options,
        )
        .map_err(|e| self.open_error(e))?;
        let ffmpeg_next::format::context::Context::Input(ictx) = ctx else {
            return Err(self.open_error("device opened as output"));
        };

        let camera = FfmpegCamera::from_input(ictx).map_err(|e| self.open_error(e))?;
        log::info!(
            "Opened camera {} ({}x{})",
            self.device,
            camera.width,
            camera.height
        );
        Ok(Box::new(camera))
    }

    fn describe(&self) -> String {
        format!("{CAPTURE_FORMAT}:{}", self.device)
    }
}

/// Decodes webcam packets and converts them to RGB24 [`Frame`]s.
pub struct FfmpegCamera {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    sequence: u64,
}

// Safety: FfmpegCamera is owned and driven by a single capture thread.
// The raw pointers inside ffmpeg types are never shared across threads.
unsafe impl Send for FfmpegCamera {}

impl FfmpegCamera {
    fn from_input(
        ictx: ffmpeg_next::format::context::Input,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            sequence: 0,
        })
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb_frame)?;

        self.sequence += 1;
        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        Ok(Some(Frame::new(pixels, self.width, self.height, self.sequence)))
    }
}

impl CameraDevice for FfmpegCamera {
    fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
        if let Some(frame) = self.try_receive()? {
            return Ok(frame);
        }
        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                return Err(Box::new(CaptureError::EndOfStream));
            };
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .map_err(|e| CaptureError::Read(e.to_string()))?;
            if let Some(frame) = self.try_receive()? {
                return Ok(frame);
            }
        }
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping any per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    pack_rows(rgb_frame.data(0), rgb_frame.stride(0), width, height)
}

fn pack_rows(data: &[u8], stride: usize, width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
