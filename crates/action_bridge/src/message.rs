//! Bridge-owned aggregate messages.
//!
//! Each engine crate defines its own request/response enums without knowing about the
//! bridge. This module owns the aggregates and the `From` impls that compose the
//! engine-local messages into them at the context boundary.

use bridge_protocol::{Operation, OperationKind};
use color_sampler::{SamplerRequest, SamplerResponse};
use scene::{SceneRequest, SceneResponse};

#[derive(Debug)]
pub enum BridgeRequest {
    Scene(SceneRequest),
    Sampler(SamplerRequest),
}

#[derive(Debug)]
pub enum BridgeResponse {
    Scene(SceneResponse),
    Sampler(SamplerResponse),
}

impl From<SceneRequest> for BridgeRequest {
    fn from(request: SceneRequest) -> Self {
        BridgeRequest::Scene(request)
    }
}

impl From<SamplerRequest> for BridgeRequest {
    fn from(request: SamplerRequest) -> Self {
        BridgeRequest::Sampler(request)
    }
}

impl From<SceneResponse> for BridgeResponse {
    fn from(response: SceneResponse) -> Self {
        BridgeResponse::Scene(response)
    }
}

impl From<SamplerResponse> for BridgeResponse {
    fn from(response: SamplerResponse) -> Self {
        BridgeResponse::Sampler(response)
    }
}

impl Operation for BridgeRequest {
    fn kind(&self) -> OperationKind {
        match self {
            BridgeRequest::Scene(request) => request.kind(),
            BridgeRequest::Sampler(request) => request.kind(),
        }
    }
}

impl Operation for BridgeResponse {
    fn kind(&self) -> OperationKind {
        match self {
            BridgeResponse::Scene(response) => response.kind(),
            BridgeResponse::Sampler(response) => response.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use bridge_protocol::EngineFamily;

    use super::*;

    #[test]
    fn aggregate_kind_matches_engine_family() {
        let scene: BridgeRequest = SceneRequest::Render.into();
        let sampler: BridgeRequest = SamplerRequest::PickColor { base_index: 0 }.into();
        assert_eq!(scene.kind().family(), EngineFamily::RenderEngine);
        assert_eq!(sampler.kind().family(), EngineFamily::ColorSampling);
    }
}
