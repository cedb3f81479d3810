//! AWS Export service: reads one event payload per stdin line and publishes
//! each to AWS IoT Core over mutual-TLS MQTT.

use anyhow::Context;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use ae_export::config::{DEFAULT_CONFIG_PATH, ServiceConfig};
use ae_export::{
    EventContext, EventRecord, PayloadReader, Publisher, SettingsLoader, StageOutcome,
};
use ae_mqtt_channel::{Connector, MqttConnector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Load config ─────────────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = ServiceConfig::from_file(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    let span = tracing::info_span!("service", key = %config.service_key);
    tracing::info!(
        parent: &span,
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        "ae-export starting"
    );

    // ── Connection settings ─────────────────────────────────────
    let loaded = SettingsLoader::new(span.clone())
        .load(config.application_settings.as_ref())
        .context("cannot start export stage")?;
    if !loaded.problems.is_empty() {
        tracing::warn!(
            parent: &span,
            problems = loaded.problems.len(),
            "application settings incomplete, publishes may fail"
        );
    }

    // ── Publisher ───────────────────────────────────────────────
    let publisher = Publisher::build(loaded.config, MqttConnector, span.clone());
    if let Err(e) = publisher.connect().await {
        tracing::warn!(
            parent: &span,
            error = %e,
            "initial connect failed, will retry per event"
        );
    }

    tracing::info!(parent: &span, topic = %publisher.topic(), "ae-export ready");

    let mut input = PayloadReader::new(BufReader::new(tokio::io::stdin()));
    loop {
        tokio::select! {
            payload = input.next_payload() => match payload {
                Ok(Some(payload)) => export_event(&publisher, &payload).await,
                Ok(None) => {
                    tracing::info!(parent: &span, "input closed");
                    break;
                }
                Err(e) => {
                    tracing::error!(parent: &span, error = %e, "failed to read input");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(parent: &span, "shutdown signal received");
                break;
            }
        }
    }

    publisher.close().await;
    tracing::info!(parent: &span, "ae-export stopped");
    Ok(())
}

/// Run one event through the publish stage and complete it. Failures are
/// logged by the stage itself.
async fn export_event<C: Connector>(publisher: &Publisher<C>, payload: &[u8]) {
    let mut event = EventRecord::with_generated_id();
    if let StageOutcome::Forward(forwarded) = publisher.process(&mut event, Some(payload)).await {
        event.complete(forwarded);
    }
}
