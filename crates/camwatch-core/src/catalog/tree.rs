// ── Catalog tree ──
//
// Value type holding the building → floor → camera hierarchy. Every
// constructor and mutator keeps the back-reference invariant: a camera's
// `building_id`/`floor_id` always name the building and floor that hold it.

use std::borrow::Cow;
use std::collections::HashSet;

use serde::Serialize;

use crate::error::CoreError;
use crate::model::{Building, BuildingId, Camera, CameraId, CameraKind, CameraRef, Floor, FloorId};

use super::filter;

/// Address given to buildings created without one.
pub const PLACEHOLDER_ADDRESS: &str = "New Building Address";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CatalogTree {
    buildings: Vec<Building>,
}

impl CatalogTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree, filling in missing back-references and rejecting
    /// ones that disagree with their position.
    pub fn from_buildings(mut buildings: Vec<Building>) -> Result<Self, CoreError> {
        for building in &mut buildings {
            for floor in &mut building.floors {
                if !link(&mut floor.building_id, &building.id) {
                    return Err(CoreError::InconsistentCatalog {
                        message: format!(
                            "floor {} claims building {} but sits in {}",
                            floor.id, floor.building_id, building.id
                        ),
                    });
                }
                for camera in &mut floor.cameras {
                    if !link(&mut camera.building_id, &building.id)
                        || !link(&mut camera.floor_id, &floor.id)
                    {
                        return Err(CoreError::InconsistentCatalog {
                            message: format!(
                                "camera {} claims {}/{} but sits in {}/{}",
                                camera.id, camera.building_id, camera.floor_id, building.id, floor.id
                            ),
                        });
                    }
                }
            }
        }
        let tree = Self { buildings };
        tree.validate()?;
        Ok(tree)
    }

    /// Parse a JSON array of buildings.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let buildings: Vec<Building> =
            serde_json::from_str(json).map_err(|e| CoreError::ValidationFailed {
                message: format!("catalog JSON: {e}"),
            })?;
        Self::from_buildings(buildings)
    }

    /// Wrap buildings already known to be consistent.
    pub(crate) fn from_linked(buildings: Vec<Building>) -> Self {
        Self { buildings }
    }

    /// Check ids and back-references.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut building_ids = HashSet::new();
        for building in &self.buildings {
            if building.id.is_empty() {
                return Err(invalid(format!("building '{}' has an empty id", building.name)));
            }
            if !building_ids.insert(&building.id) {
                return Err(invalid(format!("duplicate building id {}", building.id)));
            }

            let mut floor_ids = HashSet::new();
            for floor in &building.floors {
                if floor.id.is_empty() || !floor_ids.insert(&floor.id) {
                    return Err(invalid(format!(
                        "floor id '{}' is empty or repeated in building {}",
                        floor.id, building.id
                    )));
                }
                if floor.building_id != building.id {
                    return Err(invalid(format!(
                        "floor {} has building_id {} but sits in {}",
                        floor.id, floor.building_id, building.id
                    )));
                }

                let mut camera_ids = HashSet::new();
                for camera in &floor.cameras {
                    if camera.id.is_empty() || !camera_ids.insert(&camera.id) {
                        return Err(invalid(format!(
                            "camera id '{}' is empty or repeated on floor {}",
                            camera.id, floor.id
                        )));
                    }
                    if camera.building_id != building.id || camera.floor_id != floor.id {
                        return Err(invalid(format!(
                            "camera {} references {}/{} but sits in {}/{}",
                            camera.id, camera.building_id, camera.floor_id, building.id, floor.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    pub fn camera_count(&self) -> usize {
        self.buildings.iter().map(Building::camera_count).sum()
    }

    pub fn building(&self, id: &BuildingId) -> Option<&Building> {
        self.buildings.iter().find(|b| &b.id == id)
    }

    pub fn floor(&self, building: &BuildingId, floor: &FloorId) -> Option<&Floor> {
        self.building(building)?.floor(floor)
    }

    pub fn camera(&self, camera: &CameraRef) -> Option<&Camera> {
        self.floor(&camera.building, &camera.floor)?
            .camera(&camera.camera)
    }

    /// Resolve a camera path to the building, floor and camera it names.
    pub fn resolve(&self, camera: &CameraRef) -> Option<(&Building, &Floor, &Camera)> {
        let building = self.building(&camera.building)?;
        let floor = building.floor(&camera.floor)?;
        let found = floor.camera(&camera.camera)?;
        Some((building, floor, found))
    }

    /// Every camera, in tree order.
    pub fn cameras(&self) -> impl Iterator<Item = &Camera> {
        self.buildings
            .iter()
            .flat_map(|b| b.floors.iter())
            .flat_map(|f| f.cameras.iter())
    }

    /// First camera with this id, in tree order.
    pub fn find_camera(&self, id: &CameraId) -> Option<&Camera> {
        self.cameras().find(|c| &c.id == id)
    }

    /// Buildings, floors and cameras matching `query`. See [`filter::filter`].
    pub fn filter(&self, query: &str) -> Cow<'_, CatalogTree> {
        filter::filter(self, query)
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Append a building with id `b{n}`.
    pub fn add_building(&mut self, name: &str, address: &str) -> Building {
        let id = BuildingId::new(next_id("b", self.buildings.len(), |candidate| {
            self.buildings.iter().any(|b| b.id.as_str() == candidate)
        }));
        let building = Building {
            id,
            name: name.to_owned(),
            address: address.to_owned(),
            floors: Vec::new(),
        };
        self.buildings.push(building.clone());
        building
    }

    /// Append a floor with id `{buildingId}-f{n}`.
    pub fn add_floor(&mut self, building: &BuildingId, name: &str) -> Result<Floor, CoreError> {
        let target = self
            .buildings
            .iter_mut()
            .find(|b| &b.id == building)
            .ok_or_else(|| CoreError::BuildingNotFound {
                id: building.to_string(),
            })?;

        let id = FloorId::new(next_id(
            &format!("{}-f", target.id),
            target.floors.len(),
            |candidate| target.floors.iter().any(|f| f.id.as_str() == candidate),
        ));
        let floor = Floor {
            id,
            building_id: target.id.clone(),
            name: name.to_owned(),
            cameras: Vec::new(),
        };
        target.floors.push(floor.clone());
        Ok(floor)
    }

    /// Append a camera with id `{floorId}-c{n}` to a floor named by id alone.
    ///
    /// Fails if the floor id appears in more than one building.
    pub fn add_camera(
        &mut self,
        floor: &FloorId,
        name: &str,
        location: &str,
    ) -> Result<Camera, CoreError> {
        let mut owners = self
            .buildings
            .iter()
            .filter(|b| b.floor(floor).is_some())
            .map(|b| b.id.clone());
        let building = owners.next().ok_or_else(|| CoreError::FloorNotFound {
            building: "*".into(),
            floor: floor.to_string(),
        })?;
        if owners.next().is_some() {
            return Err(CoreError::ValidationFailed {
                message: format!("floor id {floor} exists in several buildings"),
            });
        }
        self.add_camera_in(&building, floor, name, location)
    }

    /// Append a camera with id `{floorId}-c{n}` to `building`/`floor`.
    pub fn add_camera_in(
        &mut self,
        building: &BuildingId,
        floor: &FloorId,
        name: &str,
        location: &str,
    ) -> Result<Camera, CoreError> {
        let target = self
            .buildings
            .iter_mut()
            .find(|b| &b.id == building)
            .ok_or_else(|| CoreError::BuildingNotFound {
                id: building.to_string(),
            })?
            .floors
            .iter_mut()
            .find(|f| &f.id == floor)
            .ok_or_else(|| CoreError::FloorNotFound {
                building: building.to_string(),
                floor: floor.to_string(),
            })?;

        let id = CameraId::new(next_id(
            &format!("{}-c", target.id),
            target.cameras.len(),
            |candidate| target.cameras.iter().any(|c| c.id.as_str() == candidate),
        ));
        let camera = Camera {
            id,
            name: name.to_owned(),
            kind: CameraKind::default(),
            location: location.to_owned(),
            building_id: target.building_id.clone(),
            floor_id: target.id.clone(),
        };
        target.cameras.push(camera.clone());
        Ok(camera)
    }

    /// Remove a camera, returning it.
    pub fn remove_camera(&mut self, camera: &CameraRef) -> Result<Camera, CoreError> {
        let not_found = || CoreError::CameraNotFound {
            camera: camera.to_string(),
        };
        let floor = self
            .buildings
            .iter_mut()
            .find(|b| b.id == camera.building)
            .and_then(|b| b.floors.iter_mut().find(|f| f.id == camera.floor))
            .ok_or_else(not_found)?;
        let index = floor
            .cameras
            .iter()
            .position(|c| c.id == camera.camera)
            .ok_or_else(not_found)?;
        Ok(floor.cameras.remove(index))
    }
}

/// Fill an empty back-reference, or report whether a present one agrees.
fn link<T: Clone + Default + PartialEq>(slot: &mut T, parent: &T) -> bool {
    if *slot == T::default() {
        *slot = parent.clone();
        true
    } else {
        slot == parent
    }
}

/// `{prefix}{len + 1}`, counting upward past ids already in use.
fn next_id(prefix: &str, len: usize, taken: impl Fn(&str) -> bool) -> String {
    let mut n = len + 1;
    loop {
        let candidate = format!("{prefix}{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn invalid(message: String) -> CoreError {
    CoreError::InconsistentCatalog { message }
}
