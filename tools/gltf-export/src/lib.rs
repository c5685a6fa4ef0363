//! gltf-export library
//!
//! Turns a traversed scene (see [`input`]) into a glTF 2.0 asset. Each mesh's
//! triangle corners are partitioned by shader and attribute layout, then
//! deduplicated into indexed vertex buffers; the resulting accessors from all
//! meshes are packed into one binary blob and written as an embedded `.gltf`,
//! a `.gltf` with sidecar files, or a `.glb` container.

pub mod accessor;
pub mod animation;
pub mod asset;
pub mod config;
pub mod container;
pub mod error;
pub mod input;
pub mod material;
pub mod mesh;
pub mod morph;
pub mod primitive;
pub mod vertex;

use std::path::Path;

pub use asset::{Asset, AssetBuilder, AssetMeta, PackedDocument, Resource};
pub use config::{ExportConfig, OutputMode};
pub use container::{WriteReport, assemble_glb, write_asset};
pub use error::{ExportError, Result};
pub use input::SceneInput;
pub use mesh::ExportableMesh;
pub use vertex::{Semantic, VertexBuffer, VertexBufferTable, VertexSignature, VertexSlot};

/// Per-mesh dedup statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshReport {
    pub name: String,
    pub corners: usize,
    pub primitives: usize,
    pub vertices: usize,
    pub morph_targets: usize,
}

impl MeshReport {
    fn new(mesh: &ExportableMesh) -> Self {
        Self {
            name: mesh.name.clone(),
            corners: mesh.corner_count,
            primitives: mesh.primitives.len(),
            vertices: mesh.vertex_count,
            morph_targets: mesh.weights.len(),
        }
    }
}

/// Build and validate the whole asset without writing anything
pub fn check_scene(scene: &SceneInput, base_dir: &Path, config: &ExportConfig) -> Result<Vec<MeshReport>> {
    let asset = AssetBuilder::from_scene(scene, base_dir, config)?.build()?;
    Ok(asset.meshes().iter().map(MeshReport::new).collect())
}

/// Build, pack and write `scene`
pub fn export_scene(scene: &SceneInput, base_dir: &Path, config: &ExportConfig) -> Result<WriteReport> {
    config.validate()?;

    let mut asset = AssetBuilder::from_scene(scene, base_dir, config)?.build()?;
    for mesh in asset.meshes() {
        tracing::info!(
            "Mesh '{}': {} corners -> {} vertices in {} primitive(s)",
            mesh.name,
            mesh.corner_count,
            mesh.vertex_count,
            mesh.primitives.len()
        );
    }

    asset.pack_accessors()?;
    let report = write_asset(&asset, config)?;

    if !report.missing.is_empty() {
        tracing::warn!(
            "{} referenced file(s) were not written: {}",
            report.missing.len(),
            report.missing.join(", ")
        );
    }
    Ok(report)
}
