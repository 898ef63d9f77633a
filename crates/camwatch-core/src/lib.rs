// camwatch-core: catalog, selection and stream sessions between the transport and the UI.

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod selection;
pub mod session;
pub mod token;

// ── Primary re-exports ──────────────────────────────────────────────
pub use catalog::{Catalog, CatalogStream, CatalogTree};
pub use config::{BackoffConfig, EndpointConfig, SessionConfig};
pub use coordinator::SessionCoordinator;
pub use error::{CoreError, SessionError};
pub use selection::{Selection, SelectionChange, SelectionController, SelectionEvents};
pub use session::{SessionContext, SessionState, SessionStatus, StreamSession};
pub use token::{TokenCell, TokenSource};

pub use model::{Building, BuildingId, Camera, CameraId, CameraKind, CameraRef, Floor, FloorId};
