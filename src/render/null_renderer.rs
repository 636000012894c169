use crate::error::LiveResult;
use crate::render::{RenderSnapshot, Renderer};

/// No-op renderer used by tests and headless usage.
///
/// It still validates frame content so tests catch non-finite data before a
/// real backend sees it.
#[derive(Debug, Default)]
pub struct NullRenderer {
    pub frames_rendered: u64,
    pub last_series_count: usize,
    pub last_point_count: usize,
    pub last_versions: Vec<u64>,
}

impl Renderer for NullRenderer {
    fn render(&mut self, frame: &RenderSnapshot) -> LiveResult<()> {
        frame.validate()?;
        self.frames_rendered += 1;
        self.last_series_count = frame.len();
        self.last_point_count = frame.total_points();
        self.last_versions = frame.versions();
        Ok(())
    }
}
