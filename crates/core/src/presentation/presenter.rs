use crossbeam_channel::Receiver;

use crate::pipeline::watch_loop::WatchMessage;
use crate::presentation::domain::frame_sink::FrameSink;

/// How the presentation side saw the run end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunEnd {
    Stopped,
    Faulted(String),
    /// The producer went away without a terminal notice.
    Disconnected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresentationSummary {
    pub frames_presented: usize,
    pub sink_errors: usize,
    pub last_summary: Option<String>,
    pub end: RunEnd,
}

/// Applies producer messages to a sink on the thread that owns the sink.
pub struct Presenter {
    sink: Box<dyn FrameSink>,
    frames_presented: usize,
    sink_errors: usize,
    last_summary: Option<String>,
}

impl Presenter {
    pub fn new(sink: Box<dyn FrameSink>) -> Self {
        Self {
            sink,
            frames_presented: 0,
            sink_errors: 0,
            last_summary: None,
        }
    }

    /// Handles one message. Returns the run's end once a terminal message arrives.
    pub fn apply(&mut self, message: WatchMessage) -> Option<RunEnd> {
        match message {
            WatchMessage::Ready { device } => {
                self.sink.notice(&format!("Watching {device}"));
                None
            }
            WatchMessage::Frame(update) => {
                match self.sink.present(&update.frame, &update.summary) {
                    Ok(()) => self.frames_presented += 1,
                    Err(e) => {
                        self.sink_errors += 1;
                        log::warn!("Sink failed on frame {}: {e}", update.frame.index());
                    }
                }
                self.last_summary = Some(update.summary);
                None
            }
            WatchMessage::Faulted(reason) => {
                self.sink.notice(&format!("Capture failed: {reason}"));
                Some(RunEnd::Faulted(reason))
            }
            WatchMessage::Stopped => {
                self.sink.notice("Capture stopped");
                Some(RunEnd::Stopped)
            }
        }
    }

    /// Drains `messages` until the run ends.
    pub fn run(&mut self, messages: &Receiver<WatchMessage>) -> PresentationSummary {
        let end = loop {
            match messages.recv() {
                Ok(message) => {
                    if let Some(end) = self.apply(message) {
                        break end;
                    }
                }
                Err(_) => break RunEnd::Disconnected,
            }
        };
        self.summary(end)
    }

    fn summary(&self, end: RunEnd) -> PresentationSummary {
        PresentationSummary {
            frames_presented: self.frames_presented,
            sink_errors: self.sink_errors,
            last_summary: self.last_summary.clone(),
            end,
        }
    }
}
