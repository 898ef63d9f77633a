// camwatch-api: stream transport for the camwatch viewer (endpoints + renderers)

pub mod endpoint;
pub mod error;
pub mod render;
pub mod websocket;

pub use endpoint::{CredentialPlacement, DEFAULT_STREAM_PATH, Endpoint, EndpointFactory};
pub use error::Error;
pub use render::{
    AttemptToken, RenderCallbacks, RenderEvent, RenderFailure, RenderHandle, RenderOptions,
    RenderSignal, Renderer,
};
pub use websocket::{DiscardSink, FrameSink, WebSocketRenderer};
