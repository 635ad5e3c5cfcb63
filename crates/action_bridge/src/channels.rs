use bridge_protocol::{RequestMessage, ResponseMessage};
use crossbeam_channel::{Receiver, Sender, bounded};

use crate::message::{BridgeRequest, BridgeResponse};

#[derive(Debug)]
pub enum WorkerCommand {
    Call(RequestMessage<BridgeRequest>),
    /// Asks the worker to release its state and exit.
    Shutdown,
}

/// Caller side of a worker link.
#[derive(Debug)]
pub struct BridgeEndpoint {
    pub command_sender: Sender<WorkerCommand>,
    pub response_receiver: Receiver<ResponseMessage<BridgeResponse>>,
}

/// Worker side of a worker link.
#[derive(Debug)]
pub struct WorkerEndpoint {
    pub command_receiver: Receiver<WorkerCommand>,
    pub response_sender: Sender<ResponseMessage<BridgeResponse>>,
}

pub fn create_bridge_channels(capacity: usize) -> (BridgeEndpoint, WorkerEndpoint) {
    let (command_sender, command_receiver) = bounded(capacity);
    let (response_sender, response_receiver) = bounded(capacity);
    (
        BridgeEndpoint {
            command_sender,
            response_receiver,
        },
        WorkerEndpoint {
            command_receiver,
            response_sender,
        },
    )
}
