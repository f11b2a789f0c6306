//! Production units: the smallest schedulable piece of a batch.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a unit is an episode or an act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Episode,
    Act,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Episode => "episode",
            UnitKind::Act => "act",
        }
    }

    /// Price multiplier applied on top of the duration cost.
    ///
    /// Episodes and acts are priced identically; only duration differs.
    pub fn credit_multiplier(&self) -> u32 {
        match self {
            UnitKind::Episode => 1,
            UnitKind::Act => 1,
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One planned unit, derived from a validated config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnitSpec {
    /// Position in the input config (0-based)
    pub unit_index: usize,
    pub kind: UnitKind,
    /// Episode or act number as given by the caller
    pub label: String,
    pub title: String,
    pub synopsis: String,
    /// Title of the series or movie this unit belongs to
    pub production_title: String,
    pub planned_duration_seconds: u32,
}

impl UnitSpec {
    /// Human-readable name, e.g. "episode 3".
    pub fn display_name(&self) -> String {
        format!("{} {}", self.kind, self.label)
    }
}
