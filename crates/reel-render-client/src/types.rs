//! Render service request/response types.

use serde::{Deserialize, Serialize};

use reel_models::{ProductionSettings, UnitSpec};

/// Request to generate one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Batch the unit belongs to
    pub reference_id: String,
    /// Position of the unit in its batch
    pub unit_index: usize,
    /// Full generation prompt
    pub prompt: String,
    /// Requested clip length in seconds
    pub duration_seconds: u32,
    /// Target aspect ratio, e.g. "16:9"
    pub aspect_ratio: String,
    /// Optional style hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl RenderRequest {
    /// Build the request for a planned unit.
    pub fn for_unit(unit: &UnitSpec, settings: &ProductionSettings, reference_id: &str) -> Self {
        Self {
            reference_id: reference_id.to_string(),
            unit_index: unit.unit_index,
            prompt: build_prompt(unit, settings),
            duration_seconds: unit.planned_duration_seconds,
            aspect_ratio: settings.aspect_ratio.clone(),
            style: settings.visual_style.clone(),
        }
    }
}

fn build_prompt(unit: &UnitSpec, settings: &ProductionSettings) -> String {
    let mut prompt = format!(
        "{} - {} {}: {}. {}",
        unit.production_title, unit.kind, unit.label, unit.title, unit.synopsis
    );
    if let Some(style) = &settings.visual_style {
        prompt.push_str(&format!(" Visual style: {}.", style));
    }
    prompt
}

/// A finished artifact returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedArtifact {
    /// Public URL of the generated video
    pub url: String,
    /// Actual length of the generated video
    pub duration_seconds: u32,
}

/// Raw response from `POST /v1/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub artifact_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

/// Error body returned by the backend on 4xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
