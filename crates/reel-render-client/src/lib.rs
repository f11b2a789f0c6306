//! Client for the external video generation backend.
//!
//! The pipeline talks to the backend only through the [`RenderBackend`]
//! trait. [`HttpRenderClient`] is the production implementation; tests plug
//! in their own doubles.

pub mod backend;
pub mod client;
pub mod error;
pub mod types;

pub use backend::RenderBackend;
pub use client::{HttpRenderClient, RenderClientConfig};
pub use error::{RenderError, RenderResult};
pub use types::{RenderRequest, RenderedArtifact};
