use std::io::{self, Write};
use std::time::Duration;

pub const BOUNDARY: &str = "frame";

/// Delay between parts, for roughly 30 frames per second.
pub const FRAME_PERIOD: Duration = Duration::from_millis(33);

/// Writes one `multipart/x-mixed-replace` part holding a JPEG image.
pub fn write_part(w: &mut impl Write, jpeg: &[u8]) -> io::Result<()> {
    write!(w, "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n")?;
    w.write_all(jpeg)?;
    w.write_all(b"\r\n")
}

/// Sequence of MJPEG parts over any writer.
pub struct MjpegWriter<W: Write> {
    inner: W,
    parts: usize,
}

impl<W: Write> MjpegWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, parts: 0 }
    }

    pub fn write_frame(&mut self, jpeg: &[u8]) -> io::Result<()> {
        write_part(&mut self.inner, jpeg)?;
        self.parts += 1;
        Ok(())
    }

    pub fn parts(&self) -> usize {
        self.parts
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
