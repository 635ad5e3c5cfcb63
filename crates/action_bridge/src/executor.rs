//! The one executor table both contexts run.
//!
//! The local dispatcher and the worker router each own a `BridgeState` and feed requests
//! through [`execute`]; neither path has logic of its own.

use color_sampler::{SamplerServices, SamplerState};
use scene::{SceneError, SceneServices, SceneState};

use crate::config::BridgeConfig;
use crate::message::{BridgeRequest, BridgeResponse};

/// Collaborators each context builds its state from.
#[derive(Debug, Clone, Default)]
pub struct BridgeServices {
    pub scene: SceneServices,
    pub sampler: SamplerServices,
}

/// Everything one execution context owns.
#[derive(Debug)]
pub struct BridgeState {
    pub scene: SceneState,
    pub sampler: SamplerState,
}

impl BridgeState {
    pub fn new(services: BridgeServices, config: &BridgeConfig) -> Self {
        Self {
            scene: SceneState::new(services.scene),
            sampler: SamplerState::new(services.sampler).with_picker_size(config.picker_size),
        }
    }

    /// Releases the surface, preview and buffers of both engines.
    pub fn dispose(&mut self) {
        match self.scene.dispose() {
            Ok(()) | Err(SceneError::NotInitialized) => {}
            Err(error) => log::warn!("[bridge] scene dispose failed: {error}"),
        }
        self.sampler.dispose();
    }
}

pub fn execute(state: &mut BridgeState, request: BridgeRequest) -> BridgeResponse {
    match request {
        BridgeRequest::Scene(request) => state.scene.handle(request).into(),
        BridgeRequest::Sampler(request) => state.sampler.handle(request).into(),
    }
}
