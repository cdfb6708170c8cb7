//! LobsterForge: autonomous treasury agent for an on-chain colony.
//!
//! Every cycle the agent reads treasury and colony metrics, runs them through
//! the evolution rule table, vets each proposed action against the safety
//! gate, executes what passes and persists the resulting state.

pub mod agent;
pub mod config;
pub mod error;
pub mod evolution;
pub mod executor;
pub mod metrics;
pub mod scheduler;
pub mod social;
pub mod state;
pub mod types;
