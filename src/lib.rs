//! # Pieuvre - Octopus Energy France account monitor
//!
//! A Rust daemon that polls the Octopus Energy France (Kraken) GraphQL API
//! and turns account data into typed sensor values: ledger balances, bills,
//! electricity and gas consumption, tariffs, contract status and an off-peak
//! (Heures Creuses) activity flag.
//!
//! ## Features
//!
//! - **Session management**: JWT token caching with refresh before expiry
//! - **Periodic polling**: Configurable cadence with forced refresh support
//! - **Sensor mapping**: Per-account and per-meter values with attributes
//! - **Off-peak schedule**: Distributor label parsing and live evaluation
//! - **Statistics**: Append-only consumption history with cumulative sums
//! - **Web Interface**: REST API over the latest snapshot
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `octopus`: Kraken API client, session tokens, wire and domain types
//! - `poller`: Periodic fetch loop and snapshot publishing
//! - `sensors`: Snapshot to sensor value mapping
//! - `offpeak`: Off-peak schedule parsing and evaluation
//! - `statistics`: Long-term consumption statistics store
//! - `web`: HTTP server and REST API

pub mod config;
pub mod error;
pub mod logging;
pub mod octopus;
pub mod offpeak;
pub mod poller;
pub mod sensors;
pub mod statistics;
pub mod web;

pub use config::Config;
pub use error::{PieuvreError, Result};
pub use poller::AccountPoller;
