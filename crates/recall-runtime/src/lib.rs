//! `recall-runtime` – Wiring, configuration and logging.
//!
//! Turns the stores in `recall-memory` into one running service.
//!
//! # Modules
//!
//! - [`orchestrator`] – [`Orchestrator`][orchestrator::Orchestrator]: owns the
//!   scratch cache, memory graph, thought tracker and persistence manager
//!   behind async locks, saves the graph after every successful mutation and
//!   exposes every memory operation plus
//!   [`get_memory_stats`][orchestrator::Orchestrator::get_memory_stats].
//! - [`config`] – [`RecallConfig`][config::RecallConfig]: settings read from
//!   `~/.recall/config.toml` with `RECALL_*` environment overrides.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.  Set
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` to enable trace export.

pub mod config;
pub mod orchestrator;
pub mod telemetry;

pub use config::{ConfigError, RecallConfig};
pub use orchestrator::{GraphStats, MemoryStats, Orchestrator, ScratchStats};
pub use telemetry::{TracerProviderGuard, init_tracing};
