// ── Catalog store ──
//
// Process-wide, read-mostly home of the camera hierarchy. Readers take
// `Arc<CatalogTree>` snapshots; mutations clone-on-write under the watch
// lock and publish the new tree to every subscriber.

mod filter;
mod tree;

use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::error::CoreError;
use crate::model::{Building, BuildingId, Camera, CameraRef, Floor, FloorId};

pub use filter::filter;
pub use tree::{CatalogTree, PLACEHOLDER_ADDRESS};

pub struct Catalog {
    tree: watch::Sender<Arc<CatalogTree>>,
}

impl Catalog {
    pub fn new(tree: CatalogTree) -> Self {
        let (tree, _) = watch::channel(Arc::new(tree));
        Self { tree }
    }

    /// Load a JSON seed file (an array of buildings).
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let load_err = |reason: String| CoreError::CatalogLoad {
            path: path.display().to_string(),
            reason,
        };
        let json = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let tree = CatalogTree::from_json(&json).map_err(|e| load_err(e.to_string()))?;
        tracing::info!(
            path = %path.display(),
            buildings = tree.buildings().len(),
            cameras = tree.camera_count(),
            "catalog loaded"
        );
        Ok(Self::new(tree))
    }

    /// Current tree.
    pub fn snapshot(&self) -> Arc<CatalogTree> {
        self.tree.borrow().clone()
    }

    pub fn subscribe(&self) -> CatalogStream {
        CatalogStream::new(self.tree.subscribe())
    }

    /// Owned, filtered copy of the current tree.
    pub fn search(&self, query: &str) -> CatalogTree {
        self.snapshot().filter(query).into_owned()
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Append a building with the placeholder address.
    pub fn add_building(&self, name: &str) -> Result<Building, CoreError> {
        self.add_building_at(name, PLACEHOLDER_ADDRESS)
    }

    pub fn add_building_at(&self, name: &str, address: &str) -> Result<Building, CoreError> {
        let building = self.mutate(|tree| Ok(tree.add_building(name, address)))?;
        tracing::info!(building = %building.id, name, "building added");
        Ok(building)
    }

    pub fn add_floor(&self, building: &BuildingId, name: &str) -> Result<Floor, CoreError> {
        let floor = self.mutate(|tree| tree.add_floor(building, name))?;
        tracing::info!(building = %building, floor = %floor.id, name, "floor added");
        Ok(floor)
    }

    pub fn add_camera(
        &self,
        floor: &FloorId,
        name: &str,
        location: &str,
    ) -> Result<Camera, CoreError> {
        let camera = self.mutate(|tree| tree.add_camera(floor, name, location))?;
        tracing::info!(camera = %camera.camera_ref(), name, "camera added");
        Ok(camera)
    }

    pub fn remove_camera(&self, camera: &CameraRef) -> Result<Camera, CoreError> {
        let removed = self.mutate(|tree| tree.remove_camera(camera))?;
        tracing::info!(camera = %camera, "camera removed");
        Ok(removed)
    }

    /// Apply a fallible edit. Subscribers are only woken when it succeeds.
    fn mutate<R>(
        &self,
        edit: impl FnOnce(&mut CatalogTree) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let mut outcome = None;
        self.tree.send_if_modified(|tree| {
            let mut next = CatalogTree::clone(tree);
            let result = edit(&mut next);
            let applied = result.is_ok();
            if applied {
                *tree = Arc::new(next);
            }
            outcome = Some(result);
            applied
        });
        outcome.unwrap_or_else(|| {
            Err(CoreError::ValidationFailed {
                message: "catalog edit did not run".into(),
            })
        })
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(CatalogTree::new())
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// A subscription to the catalog.
///
/// Offers the snapshot captured at creation, the latest snapshot, and
/// change notification via [`changed`](Self::changed) or as a `Stream`.
pub struct CatalogStream {
    current: Arc<CatalogTree>,
    receiver: watch::Receiver<Arc<CatalogTree>>,
}

impl CatalogStream {
    fn new(receiver: watch::Receiver<Arc<CatalogTree>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    pub fn current(&self) -> &Arc<CatalogTree> {
        &self.current
    }

    pub fn latest(&self) -> Arc<CatalogTree> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the catalog is dropped.
    pub async fn changed(&mut self) -> Option<Arc<CatalogTree>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    pub fn into_stream(self) -> CatalogWatchStream {
        CatalogWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` of catalog snapshots, starting with the current one.
pub struct CatalogWatchStream {
    inner: WatchStream<Arc<CatalogTree>>,
}

impl Stream for CatalogWatchStream {
    type Item = Arc<CatalogTree>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
