//! One-shot response listeners keyed by `(kind, call id)`.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bridge_protocol::{CallKey, Operation, ResponseMessage};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::error::BridgeError;
use crate::message::BridgeResponse;

pub(crate) type Extract<T> = fn(BridgeResponse) -> Result<T, BridgeError>;

#[derive(Debug, Default)]
pub(crate) struct ListenerTable {
    listeners: Mutex<HashMap<CallKey, Sender<BridgeResponse>>>,
}

impl ListenerTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<CallKey, Sender<BridgeResponse>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, key: CallKey) -> Receiver<BridgeResponse> {
        let (sender, receiver) = bounded(1);
        self.lock().insert(key, sender);
        receiver
    }

    pub(crate) fn remove(&self, key: CallKey) -> bool {
        self.lock().remove(&key).is_some()
    }

    /// Hands the response to its listener and drops the listener. False when nobody
    /// is waiting for that key.
    pub(crate) fn deliver(&self, message: ResponseMessage<BridgeResponse>) -> bool {
        let key = message.key();
        let Some(listener) = self.lock().remove(&key) else {
            return false;
        };
        listener.send(message.response).is_ok()
    }

    /// Drops every listener; their calls resolve as disconnected.
    pub(crate) fn close(&self) {
        self.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Routes worker responses to their listeners until the worker side hangs up.
pub(crate) fn spawn_response_pump(
    responses: Receiver<ResponseMessage<BridgeResponse>>,
    listeners: Arc<ListenerTable>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("bridge-responses".to_owned())
        .spawn(move || {
            for message in responses.iter() {
                let key = message.key();
                if !listeners.deliver(message) {
                    log::warn!(
                        "[bridge] dropping {} response for {}: no listener",
                        key.kind,
                        key.call_id
                    );
                }
            }
            listeners.close();
            log::debug!("[bridge] response pump exiting");
        })
}

/// Removes its listener when dropped, so an abandoned or timed-out call leaves nothing
/// behind in the table.
struct ListenerGuard {
    key: CallKey,
    listeners: Arc<ListenerTable>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.listeners.remove(self.key);
    }
}

/// Result of one bridge call. Resolves exactly once, through [`PendingCall::wait`].
pub struct PendingCall<T> {
    state: PendingState<T>,
}

enum PendingState<T> {
    Ready(Result<T, BridgeError>),
    Waiting {
        guard: ListenerGuard,
        receiver: Receiver<BridgeResponse>,
        timeout: Option<Duration>,
        extract: Extract<T>,
    },
}

impl<T> PendingCall<T> {
    pub(crate) fn ready(result: Result<T, BridgeError>) -> Self {
        Self {
            state: PendingState::Ready(result),
        }
    }

    pub(crate) fn waiting(
        key: CallKey,
        receiver: Receiver<BridgeResponse>,
        listeners: Arc<ListenerTable>,
        timeout: Option<Duration>,
        extract: Extract<T>,
    ) -> Self {
        Self {
            state: PendingState::Waiting {
                guard: ListenerGuard { key, listeners },
                receiver,
                timeout,
                extract,
            },
        }
    }

    /// Key of the posted request; `None` for calls resolved in-process.
    pub fn key(&self) -> Option<CallKey> {
        match &self.state {
            PendingState::Waiting { guard, .. } => Some(guard.key),
            PendingState::Ready(_) => None,
        }
    }

    /// Blocks until the response for this call arrives, the timeout passes, or the
    /// worker goes away.
    pub fn wait(self) -> Result<T, BridgeError> {
        let (guard, receiver, timeout, extract) = match self.state {
            PendingState::Ready(result) => return result,
            PendingState::Waiting {
                guard,
                receiver,
                timeout,
                extract,
            } => (guard, receiver, timeout, extract),
        };
        let key = guard.key;
        let disconnected = BridgeError::Disconnected { kind: key.kind };
        let response = match timeout {
            None => receiver.recv().map_err(|_| disconnected)?,
            Some(timeout) => match receiver.recv_timeout(timeout) {
                Ok(response) => response,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(BridgeError::Timeout {
                        kind: key.kind,
                        call_id: key.call_id,
                        timeout,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => return Err(disconnected),
            },
        };
        drop(guard);
        if response.kind() != key.kind {
            return Err(BridgeError::UnexpectedResponse {
                expected: key.kind,
                actual: response.kind(),
            });
        }
        extract(response)
    }
}

impl<T> fmt::Debug for PendingCall<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            PendingState::Ready(_) => "ready",
            PendingState::Waiting { .. } => "waiting",
        };
        formatter
            .debug_struct("PendingCall")
            .field("key", &self.key())
            .field("state", &state)
            .finish()
    }
}
