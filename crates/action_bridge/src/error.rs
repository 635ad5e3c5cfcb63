use std::time::Duration;

use bridge_protocol::{CallId, OperationKind, TransferError};
use color_sampler::SamplerError;
use scene::SceneError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("worker is gone; {kind} was not answered")]
    Disconnected { kind: OperationKind },
    #[error("{kind} call {call_id} timed out after {timeout:?}")]
    Timeout {
        kind: OperationKind,
        call_id: CallId,
        timeout: Duration,
    },
    #[error("expected a {expected} response, got {actual}")]
    UnexpectedResponse {
        expected: OperationKind,
        actual: OperationKind,
    },
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Sampler(#[from] SamplerError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error("failed to spawn worker thread")]
    WorkerSpawn(#[source] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
