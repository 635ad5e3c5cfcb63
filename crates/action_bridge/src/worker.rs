//! Worker-side router.
//!
//! Owns the worker context's `BridgeState`, answers every call with the same call id,
//! and releases both engines before the thread exits.

use std::io;
use std::thread::{self, JoinHandle};

use bridge_protocol::ResponseMessage;

use crate::channels::{WorkerCommand, WorkerEndpoint};
use crate::config::BridgeConfig;
use crate::executor::{BridgeServices, BridgeState, execute};

#[derive(Debug)]
pub struct WorkerThread {
    handle: JoinHandle<()>,
}

impl WorkerThread {
    /// Spawns the router thread. The state is built on the worker so nothing but the
    /// collaborators crosses the boundary.
    pub fn spawn(
        services: BridgeServices,
        config: &BridgeConfig,
        endpoint: WorkerEndpoint,
    ) -> io::Result<Self> {
        let worker_config = config.clone();
        let handle = thread::Builder::new()
            .name(config.worker_thread_name.clone())
            .spawn(move || {
                let state = BridgeState::new(services, &worker_config);
                run_worker_loop(state, endpoint);
            })?;
        Ok(Self { handle })
    }

    pub fn join(self) {
        if let Err(panic) = self.handle.join() {
            log::error!("[worker] worker thread panicked: {panic:?}");
        }
    }
}

/// Serves calls until shutdown is requested or either channel disconnects.
pub fn run_worker_loop(mut state: BridgeState, endpoint: WorkerEndpoint) {
    let mut served = 0u64;
    loop {
        match endpoint.command_receiver.recv() {
            Ok(WorkerCommand::Call(message)) => {
                let (call_id, request) = message.into_parts();
                let response = execute(&mut state, request);
                served += 1;
                if endpoint
                    .response_sender
                    .send(ResponseMessage::new(call_id, response))
                    .is_err()
                {
                    log::warn!("[worker] response channel disconnected");
                    break;
                }
            }
            Ok(WorkerCommand::Shutdown) => {
                log::debug!("[worker] shutdown requested");
                break;
            }
            Err(_) => {
                log::debug!("[worker] request channel disconnected");
                break;
            }
        }
    }
    state.dispose();
    log::debug!("[worker] worker loop exiting after {served} calls");
}
