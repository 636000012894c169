mod null_renderer;
mod snapshot;

pub use null_renderer::NullRenderer;
pub use snapshot::RenderSnapshot;

use crate::error::LiveResult;

/// Contract implemented by any drawing backend.
///
/// Backends receive an already captured [`RenderSnapshot`]: no series lock is
/// held while they draw, and the snapshot is theirs to drop afterwards.
pub trait Renderer {
    fn render(&mut self, frame: &RenderSnapshot) -> LiveResult<()>;
}
