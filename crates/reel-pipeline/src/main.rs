//! Batch production CLI.
//!
//! Usage: `reel-produce <request.json>`

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_ledger::{CreditLedger, CreditStore, HttpCreditStore, MemoryCreditStore};
use reel_models::ProductionRequest;
use reel_pipeline::{PipelineConfig, ProductionController, ProductionError, ProductionResult};
use reel_render_client::HttpRenderClient;

const DEFAULT_MEMORY_BALANCE: u32 = 1000;

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS); a second
    // install attempt only means one is already present.
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();
    init_tracing();

    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: reel-produce <request.json>");
            std::process::exit(2);
        }
    };

    match run(&path).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("reel-produce failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("reel_pipeline=info,reel_ledger=info,reel_render_client=info")
    });

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

/// Exit code when billing for the printed result is still unsettled.
const EXIT_DEDUCTION_UNSETTLED: i32 = 3;

/// Run one request and print the response. Returns the exit code.
async fn run(path: &str) -> Result<i32> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let request: ProductionRequest =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?;

    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    let controller = match build_controller(&request.user_id, config).await {
        Ok(controller) => controller,
        Err(e) => return print_rejection(&e),
    };

    let mut response = match controller.produce(request).await {
        Ok(response) => response,
        Err(e) => return print_rejection(&e),
    };

    // One last attempt before exiting; a long-running host would keep the
    // reconciler running instead.
    let report = controller.settle_deferred(&mut response).await;
    let code = if report.still_pending > 0 {
        warn!(
            pending = report.still_pending,
            "Deferred deductions could not be applied before exit"
        );
        EXIT_DEDUCTION_UNSETTLED
    } else {
        0
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(code)
}

async fn build_controller(
    user_id: &str,
    config: PipelineConfig,
) -> ProductionResult<ProductionController> {
    let backend = Arc::new(
        HttpRenderClient::from_env()
            .map_err(|e| ProductionError::config(format!("render client: {}", e)))?,
    );
    if !backend.health_check().await.unwrap_or(false) {
        warn!("Render service health check failed, continuing anyway");
    }

    let store = credit_store(user_id)?;
    let ledger = Arc::new(CreditLedger::new(store));
    Ok(ProductionController::new(backend, ledger, config))
}

fn print_rejection(e: &ProductionError) -> Result<i32> {
    error!(status = e.http_status(), "Production rejected: {}", e);
    let body = serde_json::json!({
        "success": false,
        "status": e.http_status(),
        "error": e.to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(1)
}

fn credit_store(user_id: &str) -> ProductionResult<Arc<dyn CreditStore>> {
    if std::env::var("CREDIT_STORE_URL").as_deref() == Ok("memory") {
        let balance = std::env::var("REEL_MEMORY_BALANCE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MEMORY_BALANCE);
        info!(balance = balance, "Using in-memory credit store");
        return Ok(Arc::new(MemoryCreditStore::new().with_balance(user_id, balance)));
    }

    Ok(Arc::new(HttpCreditStore::from_env()?))
}
