//! Catalog command handlers.

use std::fmt::Write as _;

use tabled::Tabled;

use camwatch_core::{Camera, Catalog, CatalogTree};

use crate::cli::{CatalogArgs, CatalogCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::resolve_camera;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct CameraRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Building")]
    building: String,
    #[tabled(rename = "Floor")]
    floor: String,
}

impl CameraRow {
    fn new(camera: &Camera, tree: &CatalogTree) -> Self {
        let building = tree.building(&camera.building_id);
        let floor = building.and_then(|b| b.floor(&camera.floor_id));
        Self {
            id: camera.id.to_string(),
            name: camera.name.clone(),
            kind: camera.kind.to_string(),
            location: or_dash(&camera.location),
            building: building.map_or_else(|| camera.building_id.to_string(), |b| b.name.clone()),
            floor: floor.map_or_else(|| camera.floor_id.to_string(), |f| f.name.clone()),
        }
    }
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".into()
    } else {
        value.into()
    }
}

// ── Detail views ────────────────────────────────────────────────────

fn tree_detail(tree: &CatalogTree) -> String {
    if tree.is_empty() {
        return "(no buildings)".into();
    }
    let mut out = String::new();
    for building in tree.buildings() {
        let _ = writeln!(
            out,
            "{} [{}]  {}  ({} cameras)",
            building.name,
            building.id,
            building.address,
            building.camera_count()
        );
        for floor in &building.floors {
            let _ = writeln!(out, "  {} [{}]", floor.name, floor.id);
            for camera in &floor.cameras {
                let _ = writeln!(
                    out,
                    "    {} [{}]  {}  {}",
                    camera.name,
                    camera.id,
                    camera.kind,
                    or_dash(&camera.location)
                );
            }
        }
    }
    out.trim_end().to_owned()
}

fn camera_detail(camera: &Camera, tree: &CatalogTree) -> String {
    let (building, floor) = match tree.resolve(&camera.camera_ref()) {
        Some((b, f, _)) => (
            format!("{} ({})", b.name, b.id),
            format!("{} ({})", f.name, f.id),
        ),
        None => (camera.building_id.to_string(), camera.floor_id.to_string()),
    };
    [
        format!("ID:       {}", camera.id),
        format!("Name:     {}", camera.name),
        format!("Type:     {}", camera.kind),
        format!("Location: {}", or_dash(&camera.location)),
        format!("Building: {building}"),
        format!("Floor:    {floor}"),
        format!("Path:     {}", camera.camera_ref()),
    ]
    .join("\n")
}

/// Every camera path in tree order, one per line.
fn camera_paths(tree: &CatalogTree) -> String {
    tree.cameras()
        .map(|c| c.camera_ref().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: CatalogArgs, catalog: &Catalog, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = catalog.snapshot();
    match args.command {
        CatalogCommand::Tree { search } => {
            let tree = snapshot.filter(search.as_deref().unwrap_or_default());
            let out = output::render_single(&global.output, &*tree, tree_detail, camera_paths)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CatalogCommand::Cameras { search } => {
            let tree = snapshot.filter(search.as_deref().unwrap_or_default());
            let cameras: Vec<Camera> = tree.cameras().cloned().collect();
            let out = output::render_list(
                &global.output,
                &cameras,
                |c| CameraRow::new(c, &tree),
                |c| c.camera_ref().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CatalogCommand::Show { camera } => {
            let found = resolve_camera(&snapshot, &camera)?;
            let out = output::render_single(
                &global.output,
                found,
                |c| camera_detail(c, &snapshot),
                |c| c.camera_ref().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
