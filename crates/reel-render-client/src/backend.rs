//! Render backend abstraction.

use async_trait::async_trait;

use crate::error::RenderResult;
use crate::types::{RenderRequest, RenderedArtifact};

/// A service that turns one unit prompt into a video artifact.
///
/// A call may be slow, rate limited, or fail transiently. Implementations
/// make exactly one attempt; retry policy belongs to the caller.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Name of this backend for logging.
    fn name(&self) -> &'static str;

    /// Generate the artifact for one unit.
    async fn render(&self, request: &RenderRequest) -> RenderResult<RenderedArtifact>;
}
