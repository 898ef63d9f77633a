// ── Selection ──
//
// Which building and/or camera the operator is looking at. Transitions
// are never rejected; ids that stop resolving are cleared lazily on the
// next read. A notification goes out only when the selected camera
// actually changes.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::catalog::CatalogTree;
use crate::model::{BuildingId, Camera, CameraRef};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum Selection {
    #[default]
    None,
    BuildingOnly(BuildingId),
    Camera(CameraRef),
}

impl Selection {
    pub fn camera(&self) -> Option<&CameraRef> {
        match self {
            Self::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn building(&self) -> Option<&BuildingId> {
        match self {
            Self::None => None,
            Self::BuildingOnly(building) => Some(building),
            Self::Camera(camera) => Some(&camera.building),
        }
    }

    /// Whether every id in the selection exists in `tree`.
    pub fn resolves_in(&self, tree: &CatalogTree) -> bool {
        match self {
            Self::None => true,
            Self::BuildingOnly(building) => tree.building(building).is_some(),
            Self::Camera(camera) => tree.camera(camera).is_some(),
        }
    }
}

/// Sent when the selected camera changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    pub previous: Option<CameraRef>,
    pub selection: Selection,
}

pub type SelectionEvents = mpsc::UnboundedReceiver<SelectionChange>;

#[derive(Debug)]
pub struct SelectionController {
    current: Selection,
    notify: mpsc::UnboundedSender<SelectionChange>,
}

impl SelectionController {
    pub fn new() -> (Self, SelectionEvents) {
        let (notify, events) = mpsc::unbounded_channel();
        (
            Self {
                current: Selection::None,
                notify,
            },
            events,
        )
    }

    /// The stored selection, without checking it against the catalog.
    pub fn selection(&self) -> &Selection {
        &self.current
    }

    /// The selection, cleared first if it no longer resolves in `tree`.
    pub fn current(&mut self, tree: &CatalogTree) -> &Selection {
        if !self.current.resolves_in(tree) {
            tracing::info!(selection = ?self.current, "selection no longer in catalog, clearing");
            self.transition(Selection::None);
        }
        &self.current
    }

    /// Select a building, dropping any camera. Returns whether the camera changed.
    pub fn select_building(&mut self, building: BuildingId) -> bool {
        self.transition(Selection::BuildingOnly(building))
    }

    /// Select a camera, taking building and floor from its back-references.
    pub fn select_camera(&mut self, camera: &Camera) -> bool {
        self.transition(Selection::Camera(camera.camera_ref()))
    }

    pub fn clear(&mut self) -> bool {
        self.transition(Selection::None)
    }

    fn transition(&mut self, next: Selection) -> bool {
        let previous = self.current.camera().cloned();
        let camera_changed = previous.as_ref() != next.camera();
        self.current = next;
        if camera_changed {
            tracing::debug!(from = ?previous, to = ?self.current, "selected camera changed");
            // The coordinator may already be gone during shutdown.
            let _ = self.notify.send(SelectionChange {
                previous,
                selection: self.current.clone(),
            });
        }
        camera_changed
    }
}
