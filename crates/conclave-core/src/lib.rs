//! Decision and allocation engine behind the `conclave` tick runner.
//!
//! A tick reads the agent's status from the Conclave debate API, chooses
//! at most one action and reports anything the operator must see:
//!
//! ```text
//! Config ──► tick::run_tick ──► client::DebateApi   (status, list, join, …)
//!                 │
//!                 ├─ selector    rank joinable debates
//!                 ├─ allocation  percentage split under the 60% cap
//!                 ├─ classifier  topic category from free text
//!                 ├─ template    proposal / comment text
//!                 └─ ticker      3-6 letter proposal ticker
//!                 │
//!                 └─► notify::Notify (webhook)
//! ```

pub mod allocation;
pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod notify;
pub mod retry;
pub mod selector;
pub mod template;
pub mod tick;
pub mod ticker;
pub mod types;

pub use error::{ConclaveError, Result};
