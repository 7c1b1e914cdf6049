//! Reprise - reorg-safe entity reduction engine, demo runner.
//!
//! Drives both reduction paths over a synthetic transfer stream with
//! scripted reorgs, against the in-memory adapters. Useful for watching the
//! engine's behavior (skips, reverts, checkpoints) without a chain or a
//! database.
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults
//! reprise
//!
//! # More records, more frequent reorgs, verbose engine logs
//! LOG_LEVEL=debug reprise --records 500 --reorg-every 10
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use futures::stream;
use futures::StreamExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use reprise_core::error::ReduceResult;
use reprise_core::metrics::init_metrics;
use reprise_core::models::{
    ChainMark, LogRecord, RecordStatus, ReduceEvent, ReduceSnapshot, RevertableEntity,
};
use reprise_core::ports::{
    EntityReducer, IdentityRecordMapper, MarkService, SnapshotReducer,
};
use reprise_core::services::{
    LiveReduceConfig, LiveReduceService, SnapshotReduceConfig, SnapshotReduceService,
};
use reprise_memory::{
    EntityIdentity, KeyedData, MemoryDataStore, MemoryEntityStore, MemoryEventStore,
    MemorySnapshotStore,
};

/// Reprise CLI - entity reduction demo by Allfeat.
#[derive(Parser, Debug)]
#[command(name = "reprise")]
#[command(about = "Reprise - reorg-safe entity reduction demo by Allfeat")]
#[command(version)]
struct Cli {
    /// Number of synthetic transfer records to generate.
    #[arg(long, env = "RECORDS", default_value = "200")]
    records: u64,

    /// Number of accounts the records rotate through.
    #[arg(long, env = "ACCOUNTS", default_value = "4")]
    accounts: u64,

    /// Depth behind the head at which a mark becomes stable.
    #[arg(long, env = "CONFIRMATIONS", default_value = "12")]
    confirmations: u64,

    /// Revert every Nth record right after it is applied (0 disables).
    #[arg(long, env = "REORG_EVERY", default_value = "25")]
    reorg_every: u64,

    /// Events per replay window on the snapshot path.
    #[arg(long, env = "SNAPSHOT_WINDOW", default_value = "10")]
    snapshot_window: usize,

    /// Prometheus metrics port (0 disables).
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    metrics_port: u16,

    /// Enable JSON log output.
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

// =============================================================================
// Demo domain: account balances and per-account volumes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Transfer {
    account: String,
    mark: ChainMark,
    status: Option<RecordStatus>,
    amount: i64,
}

impl Transfer {
    fn confirmed(account: &str, height: u64, amount: i64) -> Self {
        Self {
            account: account.into(),
            mark: ChainMark::new(height, 0),
            status: Some(RecordStatus::Confirmed),
            amount,
        }
    }

    fn reverted(&self) -> Self {
        Self {
            status: Some(RecordStatus::Reverted),
            ..self.clone()
        }
    }
}

impl LogRecord for Transfer {
    fn status(&self) -> Option<RecordStatus> {
        self.status
    }

    fn is_same_record(&self, other: &Self) -> bool {
        self.account == other.account && self.mark == other.mark && self.amount == other.amount
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Balance {
    account: String,
    value: i64,
    records: Vec<Transfer>,
}

impl RevertableEntity<String, Transfer> for Balance {
    fn id(&self) -> &String {
        &self.account
    }

    fn records(&self) -> &[Transfer] {
        &self.records
    }

    fn with_records(mut self, records: Vec<Transfer>) -> Self {
        self.records = records;
        self
    }
}

struct BalanceIdentity;

impl EntityIdentity<String, Transfer, Balance> for BalanceIdentity {
    fn entity_id(&self, record: &Transfer) -> String {
        record.account.clone()
    }

    fn template(&self, id: &String) -> Balance {
        Balance {
            account: id.clone(),
            value: 0,
            records: Vec::new(),
        }
    }
}

struct BalanceReducer;

#[async_trait]
impl EntityReducer<Transfer, Balance> for BalanceReducer {
    async fn reduce(&self, mut entity: Balance, record: &Transfer) -> ReduceResult<Balance> {
        match record.status {
            Some(status) if status.is_additive() => entity.value += record.amount,
            Some(_) => entity.value -= record.amount,
            None => {}
        }
        Ok(entity)
    }
}

/// Marks this far behind the generated head can no longer be reverted.
struct HeadMarks {
    stable_below: u64,
}

impl MarkService<Transfer, ChainMark> for HeadMarks {
    fn mark(&self, record: &Transfer) -> ChainMark {
        record.mark
    }

    fn is_stable(&self, mark: &ChainMark) -> bool {
        mark.height < self.stable_below
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Volume {
    account: String,
    moved: i64,
}

impl KeyedData<String> for Volume {
    fn data_key(&self) -> String {
        self.account.clone()
    }
}

struct VolumeReducer;

#[async_trait]
impl SnapshotReducer<String, ChainMark, Transfer, Volume> for VolumeReducer {
    fn data_key(&self, event: &Transfer) -> String {
        event.account.clone()
    }

    fn initial_data(&self, key: &String) -> Volume {
        Volume {
            account: key.clone(),
            moved: 0,
        }
    }

    async fn reduce_window(
        &self,
        data: Volume,
        window: &[Transfer],
    ) -> ReduceResult<ReduceSnapshot<ChainMark, Volume>> {
        let moved = window
            .iter()
            .fold(data.moved, |acc, event| acc + event.amount.abs());
        let mark = window.last().map(|event| event.mark).unwrap_or_default();
        Ok(ReduceSnapshot::new(
            mark,
            Volume {
                account: data.account,
                moved,
            },
        ))
    }
}

impl ReduceEvent<ChainMark> for Transfer {
    fn mark(&self) -> ChainMark {
        self.mark
    }
}

// =============================================================================
// Synthetic chain
// =============================================================================

/// Deterministic transfer stream with scripted reorg points.
///
/// Every `reorg_every`th record is re-delivered as reverted immediately
/// after, simulating the indexer unwinding a dropped block.
fn synthetic_records(cli: &Cli) -> Vec<Transfer> {
    let mut records = Vec::new();
    for height in 1..=cli.records {
        let account = format!("account-{}", height % cli.accounts.max(1));
        let amount = (height % 7 + 1) as i64;
        let record = Transfer::confirmed(&account, height, amount);

        let reorged = cli.reorg_every != 0 && height % cli.reorg_every == 0;
        records.push(record.clone());
        if reorged {
            // The chain drops this block right after announcing it.
            records.push(record.reverted());
        }
    }
    records
}

// =============================================================================
// Entrypoint
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    // Prometheus metrics exporter (optional - failures don't crash the demo)
    if cli.metrics_port != 0 {
        let address = format!("0.0.0.0:{}", cli.metrics_port);
        match address.parse::<std::net::SocketAddr>() {
            Ok(metrics_addr) => match PrometheusBuilder::new()
                .with_http_listener(metrics_addr)
                .install()
            {
                Ok(()) => {
                    init_metrics();
                    info!("📊 Metrics: http://localhost:{}/metrics", cli.metrics_port);
                }
                Err(e) => {
                    warn!("⚠️  Failed to start metrics exporter: {e}. Continuing without metrics.");
                }
            },
            Err(e) => warn!("⚠️  Invalid metrics address: {e}. Continuing without metrics."),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 🚀 STARTUP
    // ─────────────────────────────────────────────────────────────────────────
    info!("🚀 Starting Reprise demo");
    debug!(
        records = cli.records,
        accounts = cli.accounts,
        confirmations = cli.confirmations,
        reorg_every = cli.reorg_every,
        "Synthetic chain parameters"
    );

    let records = synthetic_records(&cli);
    let head = cli.records;
    let marks = Arc::new(HeadMarks {
        stable_below: head.saturating_sub(cli.confirmations),
    });

    // ─────────────────────────────────────────────────────────────────────────
    // ⛓️ LIVE PATH
    // ─────────────────────────────────────────────────────────────────────────
    let entities: Arc<MemoryEntityStore<String, Transfer, Balance>> =
        Arc::new(MemoryEntityStore::new(Arc::new(BalanceIdentity)));
    let live = LiveReduceService::new(
        LiveReduceConfig::default(),
        marks,
        Arc::new(IdentityRecordMapper),
        entities.clone(),
        Arc::new(BalanceReducer),
    );

    info!(records = records.len(), "⛓️  Reducing live record stream");
    let updates = live.reduce(stream::iter(records.clone()));
    tokio::pin!(updates);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut persisted = 0u64;
    let mut failed = 0u64;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("🛑 Interrupted, stopping stream");
                break;
            }
            update = updates.next() => match update {
                Some(Ok(balance)) => {
                    persisted += 1;
                    debug!(
                        account = %balance.account,
                        value = balance.value,
                        retained = balance.records.len(),
                        "Balance updated"
                    );
                }
                Some(Err(e)) => {
                    failed += 1;
                    error!(error = %e, "❌ Run failed");
                }
                None => break,
            },
        }
    }
    info!(persisted, failed, "⛓️  Live reduction finished");

    // ─────────────────────────────────────────────────────────────────────────
    // 📸 SNAPSHOT PATH
    // ─────────────────────────────────────────────────────────────────────────
    let events: Arc<MemoryEventStore<String, Transfer>> = Arc::new(MemoryEventStore::new());
    let snapshots: Arc<MemorySnapshotStore<String, ChainMark, Volume>> =
        Arc::new(MemorySnapshotStore::new());
    let volumes: Arc<MemoryDataStore<String, Volume>> = Arc::new(MemoryDataStore::new());
    let snapshot_service = SnapshotReduceService::new(
        SnapshotReduceConfig {
            min_events_before_snapshot: cli.snapshot_window,
            ..Default::default()
        },
        Arc::new(VolumeReducer),
        events.clone(),
        snapshots.clone(),
        volumes.clone(),
    );

    // The durable history the snapshot path replays from: the additive
    // records only, as an event feed.
    let additive: Vec<Transfer> = records
        .into_iter()
        .filter(|r| r.status.is_some_and(RecordStatus::is_additive))
        .collect();
    for event in &additive {
        events.append(event.account.clone(), [event.clone()]);
    }

    info!(events = additive.len(), "📸 Reducing snapshot batch");
    let saved = snapshot_service
        .on_events(&additive)
        .await
        .context("Snapshot reduction failed")?;
    info!(
        saved = saved.len(),
        checkpoints = snapshots.len(),
        "📸 Snapshot reduction finished"
    );

    // ─────────────────────────────────────────────────────────────────────────
    // ✅ SUMMARY
    // ─────────────────────────────────────────────────────────────────────────
    let mut summary: Vec<Balance> = (0..cli.accounts.max(1))
        .filter_map(|i| entities.stored(&format!("account-{i}")))
        .collect();
    summary.sort_by(|a, b| a.account.cmp(&b.account));

    info!("✅ Final balances:");
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// Initialize tracing subscriber.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
