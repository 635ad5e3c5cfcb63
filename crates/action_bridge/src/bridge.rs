//! Action bridge dispatcher.
//!
//! Every operation is written once against `ActionBridge`. In local mode the executor
//! runs in-process and the returned `PendingCall` is already resolved; in worker mode
//! the request is posted with a fresh call id and the call resolves when the response
//! carrying the same `(kind, call id)` comes back.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bridge_protocol::{
    CallIdAllocator, ContainerKey, ElementId, ImageBytes, ImageSource, Operation,
    OperationKind, PixelBuffer, RequestMessage, Rgb, Rgba, SurfaceRect, Transferable,
};
use color_sampler::{
    DecoderModule, PreviewCanvas, SamplerRequest, SamplerResponse, SamplerStats,
};
use crossbeam_channel::Sender;
use scene::{
    BlurProps, InitOptions, RenderedSurface, SceneRequest, SceneResponse, SceneStats,
    SurfaceDisplay, WatermarkDiff, WatermarkProps,
};

use crate::channels::{BridgeEndpoint, WorkerCommand, create_bridge_channels};
use crate::config::{BridgeConfig, ExecutionMode};
use crate::error::BridgeError;
use crate::executor::{BridgeServices, BridgeState, execute};
use crate::message::{BridgeRequest, BridgeResponse};
use crate::pending::{Extract, ListenerTable, PendingCall, spawn_response_pump};
use crate::worker::WorkerThread;

/// Per-call dispatch options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvokeOptions {
    /// `None` waits until the worker answers or goes away.
    pub timeout: Option<Duration>,
}

fn unexpected(expected: OperationKind, response: &BridgeResponse) -> BridgeError {
    BridgeError::UnexpectedResponse {
        expected,
        actual: response.kind(),
    }
}

/// Builds the extractor turning an aggregate response into one operation's payload.
/// A trailing `?` marks payloads that carry the executor's `Result`.
macro_rules! reply {
    ($family:ident, $response:ident :: $variant:ident) => {
        |response: BridgeResponse| match response {
            BridgeResponse::$family($response::$variant(value)) => Ok(value),
            other => Err(unexpected(OperationKind::$variant, &other)),
        }
    };
    ($family:ident, $response:ident :: $variant:ident ?) => {
        |response: BridgeResponse| match response {
            BridgeResponse::$family($response::$variant(result)) => Ok(result?),
            other => Err(unexpected(OperationKind::$variant, &other)),
        }
    };
}

#[derive(Debug)]
struct WorkerLink {
    commands: Sender<WorkerCommand>,
    listeners: Arc<ListenerTable>,
    call_ids: CallIdAllocator,
    pump: Option<JoinHandle<()>>,
    /// `None` when attached to an endpoint served elsewhere.
    worker: Option<WorkerThread>,
}

#[derive(Debug)]
enum Dispatch {
    Local(Box<BridgeState>),
    Worker(WorkerLink),
}

#[derive(Debug)]
pub struct ActionBridge {
    dispatch: Dispatch,
    config: BridgeConfig,
    shut_down: bool,
}

impl ActionBridge {
    /// Builds a bridge in the execution mode the config asks for.
    pub fn new(services: BridgeServices, config: BridgeConfig) -> Result<Self, BridgeError> {
        match config.execution {
            ExecutionMode::Local => Self::local(services, config),
            ExecutionMode::Worker => Self::with_worker(services, config),
        }
    }

    pub fn local(services: BridgeServices, config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let state = BridgeState::new(services, &config);
        log::debug!("[bridge] running executors in-process");
        Ok(Self {
            dispatch: Dispatch::Local(Box::new(state)),
            config,
            shut_down: false,
        })
    }

    pub fn with_worker(
        services: BridgeServices,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let (bridge_endpoint, worker_endpoint) = create_bridge_channels(config.request_capacity);
        let worker = WorkerThread::spawn(services, &config, worker_endpoint)
            .map_err(BridgeError::WorkerSpawn)?;
        log::debug!("[bridge] worker `{}` started", config.worker_thread_name);
        Self::connect(bridge_endpoint, config, Some(worker))
    }

    /// Attaches to a worker endpoint served by someone else (another router, a mock).
    pub fn attach(endpoint: BridgeEndpoint, config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        Self::connect(endpoint, config, None)
    }

    fn connect(
        endpoint: BridgeEndpoint,
        config: BridgeConfig,
        worker: Option<WorkerThread>,
    ) -> Result<Self, BridgeError> {
        let listeners = Arc::new(ListenerTable::default());
        let pump = spawn_response_pump(endpoint.response_receiver, listeners.clone())
            .map_err(BridgeError::WorkerSpawn)?;
        Ok(Self {
            dispatch: Dispatch::Worker(WorkerLink {
                commands: endpoint.command_sender,
                listeners,
                call_ids: CallIdAllocator::default(),
                pump: Some(pump),
                worker,
            }),
            config,
            shut_down: false,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn is_worker(&self) -> bool {
        matches!(self.dispatch, Dispatch::Worker(_))
    }

    /// Calls posted to the worker that have not resolved yet.
    pub fn pending_calls(&self) -> usize {
        match &self.dispatch {
            Dispatch::Local(_) => 0,
            Dispatch::Worker(link) => link.listeners.len(),
        }
    }

    fn default_options(&self) -> InvokeOptions {
        InvokeOptions {
            timeout: self.config.default_timeout(),
        }
    }

    pub fn invoke(
        &mut self,
        request: impl Into<BridgeRequest>,
    ) -> Result<PendingCall<BridgeResponse>, BridgeError> {
        let options = self.default_options();
        self.invoke_with(request, options)
    }

    pub fn invoke_with(
        &mut self,
        request: impl Into<BridgeRequest>,
        options: InvokeOptions,
    ) -> Result<PendingCall<BridgeResponse>, BridgeError> {
        self.dispatch(request.into(), options, Ok)
    }

    fn dispatch<T>(
        &mut self,
        request: BridgeRequest,
        options: InvokeOptions,
        extract: Extract<T>,
    ) -> Result<PendingCall<T>, BridgeError> {
        match &mut self.dispatch {
            Dispatch::Local(state) => Ok(PendingCall::ready(extract(execute(state, request)))),
            Dispatch::Worker(link) => {
                let message = RequestMessage::new(link.call_ids.next(), request);
                let key = message.key();
                let receiver = link.listeners.register(key);
                if link.commands.send(WorkerCommand::Call(message)).is_err() {
                    link.listeners.remove(key);
                    return Err(BridgeError::Disconnected { kind: key.kind });
                }
                Ok(PendingCall::waiting(
                    key,
                    receiver,
                    link.listeners.clone(),
                    options.timeout,
                    extract,
                ))
            }
        }
    }

    fn call<T>(&mut self, request: impl Into<BridgeRequest>, extract: Extract<T>) -> PendingCall<T> {
        let options = self.default_options();
        match self.dispatch(request.into(), options, extract) {
            Ok(pending) => pending,
            Err(error) => PendingCall::ready(Err(error)),
        }
    }

    pub fn init(&mut self, options: InitOptions) -> PendingCall<SurfaceDisplay> {
        self.call(SceneRequest::Init(options), reply!(Scene, SceneResponse::Init?))
    }

    pub fn dispose(&mut self) -> PendingCall<()> {
        self.call(SceneRequest::Dispose, reply!(Scene, SceneResponse::Dispose?))
    }

    pub fn create_container(&mut self, key: impl Into<ContainerKey>) -> PendingCall<ContainerKey> {
        self.call(
            SceneRequest::CreateContainer { key: key.into() },
            reply!(Scene, SceneResponse::CreateContainer?),
        )
    }

    pub fn resize(&mut self, width: u32, height: u32) -> PendingCall<()> {
        self.call(
            SceneRequest::ResizeSurface { width, height },
            reply!(Scene, SceneResponse::ResizeSurface?),
        )
    }

    pub fn clear(&mut self) -> PendingCall<()> {
        self.call(
            SceneRequest::ClearSurface,
            reply!(Scene, SceneResponse::ClearSurface?),
        )
    }

    pub fn extract_pixels(&mut self, rect: SurfaceRect) -> PendingCall<PixelBuffer> {
        self.call(
            SceneRequest::ExtractPixels { rect },
            reply!(Scene, SceneResponse::ExtractPixels?),
        )
    }

    pub fn render_to_surface(&mut self, rect: SurfaceRect) -> PendingCall<RenderedSurface> {
        self.call(
            SceneRequest::RenderToSurface { rect },
            reply!(Scene, SceneResponse::RenderToSurface?),
        )
    }

    /// Resolves to the sequence number of the published frame.
    pub fn render(&mut self) -> PendingCall<u64> {
        self.call(SceneRequest::Render, reply!(Scene, SceneResponse::Render?))
    }

    pub fn add_image_to_container(
        &mut self,
        key: impl Into<ContainerKey>,
        source: impl Into<ImageSource>,
    ) -> PendingCall<()> {
        self.call(
            SceneRequest::AddImageToContainer {
                key: key.into(),
                source: source.into(),
            },
            reply!(Scene, SceneResponse::AddImageToContainer?),
        )
    }

    pub fn clear_container(&mut self, key: impl Into<ContainerKey>) -> PendingCall<()> {
        self.call(
            SceneRequest::ClearContainer { key: key.into() },
            reply!(Scene, SceneResponse::ClearContainer?),
        )
    }

    pub fn create_blur_effect(
        &mut self,
        container: impl Into<ContainerKey>,
        element: impl Into<ElementId>,
    ) -> PendingCall<()> {
        self.call(
            SceneRequest::CreateBlurEffect {
                container: container.into(),
                element: element.into(),
            },
            reply!(Scene, SceneResponse::CreateBlurEffect?),
        )
    }

    pub fn update_blur_effect(
        &mut self,
        element: impl Into<ElementId>,
        props: BlurProps,
        update_filter: bool,
    ) -> PendingCall<()> {
        self.call(
            SceneRequest::UpdateBlurEffect {
                element: element.into(),
                props,
                update_filter,
            },
            reply!(Scene, SceneResponse::UpdateBlurEffect?),
        )
    }

    pub fn delete_blur_effect(&mut self, element: impl Into<ElementId>) -> PendingCall<()> {
        self.call(
            SceneRequest::DeleteBlurEffect {
                element: element.into(),
            },
            reply!(Scene, SceneResponse::DeleteBlurEffect?),
        )
    }

    pub fn update_watermark(
        &mut self,
        container: impl Into<ContainerKey>,
        props: WatermarkProps,
        text_resolution: f32,
    ) -> PendingCall<WatermarkDiff> {
        self.call(
            SceneRequest::UpdateWatermark {
                container: container.into(),
                props,
                text_resolution,
            },
            reply!(Scene, SceneResponse::UpdateWatermark?),
        )
    }

    pub fn describe_scene(&mut self) -> PendingCall<SceneStats> {
        self.call(
            SceneRequest::DescribeScene,
            reply!(Scene, SceneResponse::DescribeScene),
        )
    }

    /// Resolves to false when the preview surface was already bound.
    pub fn init_preview_surface(
        &mut self,
        canvas: PreviewCanvas,
        decoder_module: DecoderModule,
    ) -> PendingCall<bool> {
        self.call(
            SamplerRequest::InitPreviewSurface {
                canvas,
                decoder_module,
            },
            reply!(Sampler, SamplerResponse::InitPreviewSurface),
        )
    }

    pub fn decode_image(&mut self, bytes: ImageBytes) -> PendingCall<PixelBuffer> {
        self.call(
            SamplerRequest::DecodeImage { bytes },
            reply!(Sampler, SamplerResponse::DecodeImage?),
        )
    }

    /// Moves the bytes out of `bytes` and decodes them. The slot is detached afterwards,
    /// so a second call on it fails without reaching the engine.
    pub fn decode_transferable(
        &mut self,
        bytes: &mut Transferable<ImageBytes>,
    ) -> PendingCall<PixelBuffer> {
        match bytes.transfer() {
            Ok(bytes) => self.decode_image(bytes),
            Err(error) => PendingCall::ready(Err(error.into())),
        }
    }

    pub fn sample_and_render_preview(
        &mut self,
        x: i32,
        y: i32,
        base_index: usize,
        center_line_color: Option<Rgba>,
    ) -> PendingCall<Rgb> {
        self.call(
            SamplerRequest::Sample {
                x,
                y,
                base_index,
                center_line_color,
            },
            reply!(Sampler, SamplerResponse::Sample),
        )
    }

    pub fn get_preview_pixel_buffer(&mut self) -> PendingCall<Option<PixelBuffer>> {
        self.call(
            SamplerRequest::GetPreviewBuffer,
            reply!(Sampler, SamplerResponse::GetPreviewBuffer),
        )
    }

    pub fn switch_history_source(&mut self, source: Option<ImageSource>) -> PendingCall<()> {
        self.call(
            SamplerRequest::SwitchHistorySource { source },
            reply!(Sampler, SamplerResponse::SwitchHistorySource?),
        )
    }

    pub fn pick_color(&mut self, base_index: usize) -> PendingCall<Rgb> {
        self.call(
            SamplerRequest::PickColor { base_index },
            reply!(Sampler, SamplerResponse::PickColor),
        )
    }

    pub fn describe_sampler(&mut self) -> PendingCall<SamplerStats> {
        self.call(
            SamplerRequest::DescribeSampler,
            reply!(Sampler, SamplerResponse::DescribeSampler),
        )
    }

    /// Releases both engines and, in worker mode, stops and joins the worker.
    pub fn terminate(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        match &mut self.dispatch {
            Dispatch::Local(state) => {
                state.dispose();
                log::debug!("[bridge] local state released");
            }
            Dispatch::Worker(link) => {
                if link.commands.send(WorkerCommand::Shutdown).is_err() {
                    log::debug!("[bridge] worker already gone at shutdown");
                }
                let Some(worker) = link.worker.take() else {
                    // The pump exits once the external endpoint drops its sender.
                    link.pump.take();
                    return;
                };
                worker.join();
                if let Some(pump) = link.pump.take() {
                    if pump.join().is_err() {
                        log::error!("[bridge] response pump panicked");
                    }
                }
                log::debug!("[bridge] worker joined");
            }
        }
    }
}

impl Drop for ActionBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
