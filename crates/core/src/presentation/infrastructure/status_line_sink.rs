use std::io::{self, Write};

use crate::presentation::domain::frame_sink::FrameSink;
use crate::shared::frame::Frame;

/// Rewrites a single terminal line with the latest summary.
pub struct StatusLineSink<W: Write> {
    out: W,
    dirty: bool,
}

impl StatusLineSink<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> StatusLineSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, dirty: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FrameSink for StatusLineSink<W> {
    fn present(&mut self, frame: &Frame, summary: &str) -> Result<(), Box<dyn std::error::Error>> {
        write!(self.out, "\r\x1b[2K[frame {}] {summary}", frame.index())?;
        self.out.flush()?;
        self.dirty = true;
        Ok(())
    }

    fn notice(&mut self, message: &str) {
        let lead = if self.dirty { "\n" } else { "" };
        if writeln!(self.out, "{lead}{message}").is_err() {
            log::warn!("Could not write status notice: {message}");
        }
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::PixelFormat;

    fn frame(index: usize) -> Frame {
        Frame::filled(2, 2, PixelFormat::Bgr, (0, 0, 0)).with_index(index)
    }

    #[test]
    fn test_present_rewrites_one_line() {
        let mut sink = StatusLineSink::new(Vec::new());
        sink.present(&frame(0), "1 faces detected").unwrap();
        sink.present(&frame(1), "0 faces detected").unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(!text.contains('\n'));
        assert!(text.ends_with("[frame 1] 0 faces detected"));
        assert_eq!(text.matches('\r').count(), 2);
    }

    #[test]
    fn test_notice_breaks_the_status_line() {
        let mut sink = StatusLineSink::new(Vec::new());
        sink.present(&frame(0), "2 faces detected").unwrap();
        sink.notice("capture stopped");

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.ends_with("2 faces detected\ncapture stopped\n"));
    }

    #[test]
    fn test_notice_without_status_has_no_blank_line() {
        let mut sink = StatusLineSink::new(Vec::new());
        sink.notice("ready");
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "ready\n");
    }
}
