//! Action bridge.
//!
//! Exposes the render and color-sampling engines through one call surface that runs
//! either in-process or on a dedicated worker thread. Callers write each operation once
//! and get a [`PendingCall`] back in both modes.

mod bridge;
mod channels;
mod config;
mod error;
mod executor;
mod message;
mod pending;
mod worker;

pub use bridge::{ActionBridge, InvokeOptions};
pub use channels::{BridgeEndpoint, WorkerCommand, WorkerEndpoint, create_bridge_channels};
pub use config::{BridgeConfig, ConfigError, ExecutionMode};
pub use error::BridgeError;
pub use executor::{BridgeServices, BridgeState, execute};
pub use message::{BridgeRequest, BridgeResponse};
pub use pending::PendingCall;
pub use worker::{WorkerThread, run_worker_loop};
