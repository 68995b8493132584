use crate::shared::frame::Frame;

/// Domain interface for whatever shows annotated frames to a viewer.
///
/// Sinks are driven only from the presentation context, so they need not be
/// `Send`.
pub trait FrameSink {
    /// Shows `frame` together with its status line.
    fn present(&mut self, frame: &Frame, summary: &str) -> Result<(), Box<dyn std::error::Error>>;

    /// Lifecycle notices such as "device ready" or a fault reason. Default: ignored.
    fn notice(&mut self, _message: &str) {}
}
