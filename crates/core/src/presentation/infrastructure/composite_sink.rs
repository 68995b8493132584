use crate::presentation::domain::frame_sink::FrameSink;
use crate::shared::frame::Frame;

/// Fans every update out to several sinks in the same context.
///
/// A failing sink does not stop the others from receiving the frame; the
/// first error is returned once all have been tried.
#[derive(Default)]
pub struct CompositeSink {
    sinks: Vec<Box<dyn FrameSink>>,
}

impl CompositeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl FrameSink for CompositeSink {
    fn present(&mut self, frame: &Frame, summary: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.present(frame, summary) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn notice(&mut self, message: &str) {
        for sink in &mut self.sinks {
            sink.notice(message);
        }
    }
}
