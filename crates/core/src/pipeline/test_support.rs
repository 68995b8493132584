//! Hand-written port stubs shared by the pipeline tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::capture::domain::capture_source::{CaptureError, CaptureSource, DeviceSelector};
use crate::detection::domain::object_detector::ObjectDetector;
use crate::shared::frame::{Frame, PixelFormat};
use crate::shared::region::Region;

#[derive(Clone, Default)]
pub struct Counters {
    pub opens: Arc<AtomicUsize>,
    pub reads: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub releases: Arc<AtomicUsize>,
}

impl Counters {
    pub fn get(counter: &Arc<AtomicUsize>) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// What the stub source does once its script runs out.
pub enum WhenExhausted {
    EndOfStream,
    /// Keep producing fresh frames forever.
    Repeat,
}

pub struct StubSource {
    script: VecDeque<Result<(), CaptureError>>,
    exhausted: WhenExhausted,
    fail_open: bool,
    open: bool,
    next_index: usize,
    counters: Counters,
}

impl StubSource {
    /// Each `Ok(())` in `script` yields a new 32x32 frame.
    pub fn new(script: Vec<Result<(), CaptureError>>, exhausted: WhenExhausted, counters: Counters) -> Self {
        Self {
            script: script.into(),
            exhausted,
            fail_open: false,
            open: false,
            next_index: 0,
            counters,
        }
    }

    pub fn frames(n: usize, counters: Counters) -> Self {
        Self::new((0..n).map(|_| Ok(())).collect(), WhenExhausted::EndOfStream, counters)
    }

    pub fn endless(counters: Counters) -> Self {
        Self::new(Vec::new(), WhenExhausted::Repeat, counters)
    }

    pub fn unopenable(counters: Counters) -> Self {
        Self {
            fail_open: true,
            ..Self::frames(0, counters)
        }
    }

    fn frame(&mut self) -> Frame {
        let frame = Frame::filled(32, 32, PixelFormat::Bgr, (10, 10, 10)).with_index(self.next_index);
        self.next_index += 1;
        frame
    }
}

impl CaptureSource for StubSource {
    fn open(&mut self, selector: &DeviceSelector) -> Result<(), CaptureError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(CaptureError::unavailable(selector, "stub refuses to open"));
        }
        self.open = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        if !self.open {
            return Err(CaptureError::DeviceLost("not open".into()));
        }
        match self.script.pop_front() {
            Some(Ok(())) => Ok(self.frame()),
            Some(Err(e)) => Err(e),
            None => match self.exhausted {
                WhenExhausted::EndOfStream => Err(CaptureError::EndOfStream),
                WhenExhausted::Repeat => Ok(self.frame()),
            },
        }
    }

    fn close(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn describe(&self) -> String {
        "stub source".to_string()
    }
}

pub struct StubDetector {
    regions: Vec<Region>,
    counters: Counters,
}

impl StubDetector {
    pub fn new(regions: Vec<Region>, counters: Counters) -> Self {
        Self { regions, counters }
    }
}

impl ObjectDetector for StubDetector {
    fn detect_frame(&mut self, _frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        Ok(self.regions.clone())
    }

    fn model_name(&self) -> &str {
        "stub"
    }

    fn release(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}
