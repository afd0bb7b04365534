//! Shared runtime state for voxgate.
//!
//! - [`tokens`]: credential pools with failover and per-token health
//! - [`tasks`]: in-flight upstream calls addressable by correlation id
//! - [`relay`]: bidirectional frame pumping between two duplex connections

#![deny(unsafe_code)]

pub mod relay;
pub mod tasks;
pub mod tokens;

pub use relay::{CLOSE_TIMEOUT, RelayEndpoint, RelayError, RelayReport, RelaySide, relay};
pub use tasks::{TaskError, TaskHandle, TaskRegistry};
pub use tokens::{PoolSnapshot, TokenLease, TokenPoolError, TokenPoolManager, TokenSnapshot};
