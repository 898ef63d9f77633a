use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::{BuildingId, CameraId, FloorId};

/// Camera hardware class, shown as a label only.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum CameraKind {
    #[default]
    #[serde(rename = "Fixed Camera")]
    #[strum(to_string = "Fixed Camera", serialize = "fixed")]
    Fixed,
    #[serde(rename = "CCTV")]
    #[strum(to_string = "CCTV")]
    Cctv,
    #[serde(rename = "IP")]
    #[strum(to_string = "IP")]
    Ip,
    Thermal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub id: CameraId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: CameraKind,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub building_id: BuildingId,
    #[serde(default)]
    pub floor_id: FloorId,
}

impl Camera {
    /// Full path to this camera.
    pub fn camera_ref(&self) -> CameraRef {
        CameraRef {
            building: self.building_id.clone(),
            floor: self.floor_id.clone(),
            camera: self.id.clone(),
        }
    }

    /// Case-insensitive match on name or location. `needle` must already be lowercase.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        contains_lower(&self.name, needle) || contains_lower(&self.location, needle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Floor {
    pub id: FloorId,
    #[serde(default)]
    pub building_id: BuildingId,
    pub name: String,
    #[serde(default)]
    pub cameras: Vec<Camera>,
}

impl Floor {
    pub fn camera(&self, id: &CameraId) -> Option<&Camera> {
        self.cameras.iter().find(|c| &c.id == id)
    }

    /// Copy of this floor with a different camera list.
    pub(crate) fn with_cameras(&self, cameras: Vec<Camera>) -> Self {
        Self {
            id: self.id.clone(),
            building_id: self.building_id.clone(),
            name: self.name.clone(),
            cameras,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub floors: Vec<Floor>,
}

impl Building {
    pub fn floor(&self, id: &FloorId) -> Option<&Floor> {
        self.floors.iter().find(|f| &f.id == id)
    }

    pub fn camera_count(&self) -> usize {
        self.floors.iter().map(|f| f.cameras.len()).sum()
    }

    /// Copy of this building with a different floor list.
    pub(crate) fn with_floors(&self, floors: Vec<Floor>) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            address: self.address.clone(),
            floors,
        }
    }
}

/// Path to a camera: building, floor, camera.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraRef {
    pub building: BuildingId,
    pub floor: FloorId,
    pub camera: CameraId,
}

impl fmt::Display for CameraRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.building, self.floor, self.camera)
    }
}

pub(crate) fn contains_lower(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}
