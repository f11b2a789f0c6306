//! Shared test doubles for pipeline integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use reel_ledger::{CreditLedger, LedgerConfig, MemoryCreditStore};
use reel_models::{ActSpec, EpisodeSpec, MovieConfig, ProductionRequest, SeriesConfig};
use reel_pipeline::{AbortHandle, PipelineConfig, ProductionController};
use reel_render_client::{
    RenderBackend, RenderError, RenderRequest, RenderResult, RenderedArtifact,
};

pub const USER: &str = "user-1";
pub const PROJECT: &str = "project-1";

/// Render backend with scripted per-unit behavior and call counting.
#[derive(Default)]
pub struct ScriptedBackend {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    rejected: HashSet<usize>,
    delays: HashMap<usize, Duration>,
    durations: HashMap<usize, u32>,
    completion_order: Mutex<Vec<usize>>,
    /// Marked unavailable on the first render call
    store_outage: Option<Arc<MemoryCreditStore>>,
    /// Cancelled on the first render call
    cancel_on_first_call: Option<AbortHandle>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail a unit with a non-transient error.
    pub fn failing(mut self, unit_index: usize) -> Self {
        self.rejected.insert(unit_index);
        self
    }

    pub fn delayed(mut self, unit_index: usize, delay: Duration) -> Self {
        self.delays.insert(unit_index, delay);
        self
    }

    /// Return an artifact of this length instead of the planned one.
    pub fn with_duration(mut self, unit_index: usize, seconds: u32) -> Self {
        self.durations.insert(unit_index, seconds);
        self
    }

    pub fn with_store_outage(mut self, store: Arc<MemoryCreditStore>) -> Self {
        self.store_outage = Some(store);
        self
    }

    pub fn cancelling(mut self, abort: AbortHandle) -> Self {
        self.cancel_on_first_call = Some(abort);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of renders observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn completion_order(&self) -> Vec<usize> {
        self.completion_order.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn render(&self, request: &RenderRequest) -> RenderResult<RenderedArtifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(store) = &self.store_outage {
            store.set_unavailable(true);
        }
        if let Some(abort) = &self.cancel_on_first_call {
            abort.cancel();
        }
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&request.unit_index) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.completion_order.lock().unwrap().push(request.unit_index);

        if self.rejected.contains(&request.unit_index) {
            return Err(RenderError::content_policy("scripted rejection"));
        }

        Ok(RenderedArtifact {
            url: format!(
                "https://cdn.example.com/{}/{}.mp4",
                request.reference_id, request.unit_index
            ),
            duration_seconds: self
                .durations
                .get(&request.unit_index)
                .copied()
                .unwrap_or(request.duration_seconds),
        })
    }
}

pub fn test_config(max_concurrent_units: usize) -> PipelineConfig {
    PipelineConfig {
        max_concurrent_units,
        retry_base_delay: Duration::from_millis(1),
        unit_timeout: Duration::from_secs(5),
        ..PipelineConfig::default()
    }
}

pub fn ledger_for(store: Arc<MemoryCreditStore>) -> Arc<CreditLedger> {
    Arc::new(CreditLedger::with_config(
        store,
        LedgerConfig {
            deduct_attempts: 2,
            retry_base_delay: Duration::from_millis(1),
        },
    ))
}

pub fn store_with(balance: u32) -> Arc<MemoryCreditStore> {
    Arc::new(MemoryCreditStore::new().with_balance(USER, balance))
}

pub fn controller(
    backend: Arc<ScriptedBackend>,
    store: Arc<MemoryCreditStore>,
    max_concurrent_units: usize,
) -> ProductionController {
    ProductionController::new(backend, ledger_for(store), test_config(max_concurrent_units))
}

/// Series with `n` episodes of 60 seconds (20 credits each).
pub fn series(n: usize) -> ProductionRequest {
    ProductionRequest::series(
        PROJECT,
        USER,
        SeriesConfig {
            title: "Harbor Lights".to_string(),
            synopsis: "A fishing town keeps its secrets.".to_string(),
            episodes: (1..=n)
                .map(|i| EpisodeSpec {
                    episode_number: i.to_string(),
                    title: format!("Episode {}", i),
                    synopsis: format!("Chapter {} of the mystery.", i),
                })
                .collect(),
            episode_duration_cap_seconds: 60,
        },
    )
}

/// Movie without an act list, produced as a single act.
pub fn movie_without_acts(minutes: u32) -> ProductionRequest {
    ProductionRequest::movie(
        PROJECT,
        USER,
        MovieConfig {
            title: "Night Train".to_string(),
            synopsis: "A heist on the last train out.".to_string(),
            acts: None,
            target_duration_minutes_cap: minutes,
        },
    )
}

/// Movie with `acts` acts over `minutes` minutes.
pub fn movie(acts: usize, minutes: u32) -> ProductionRequest {
    ProductionRequest::movie(
        PROJECT,
        USER,
        MovieConfig {
            title: "Night Train".to_string(),
            synopsis: "A heist on the last train out.".to_string(),
            acts: Some(
                (1..=acts)
                    .map(|i| ActSpec {
                        act_number: i.to_string(),
                        title: format!("Act {}", i),
                        synopsis: "Things get worse.".to_string(),
                    })
                    .collect(),
            ),
            target_duration_minutes_cap: minutes,
        },
    )
}
