//! Kraken France API integration: session tokens, GraphQL client, wire and
//! domain types.

pub mod client;
pub mod queries;
pub mod token;
pub mod types;

// Re-exports for the public API surface
pub use client::OctopusClient;
pub use token::TokenManager;
pub use types::{AccountSnapshot, LedgerKind};
