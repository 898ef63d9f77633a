// ── Domain model ──
//
// Buildings contain floors, floors contain cameras. Back-references are
// plain ids so the tree stays a value type.

pub(crate) mod facility;
mod ids;

pub use facility::{Building, Camera, CameraKind, CameraRef, Floor};
pub use ids::{BuildingId, CameraId, FloorId};
