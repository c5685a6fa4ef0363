//! Scene input model
//!
//! This is what the (external) scene traversal hands to the exporter: flat,
//! already space-converted element arrays plus per-corner element indices.
//! Everything here is plain serde data so a traversal can be run out of process
//! and its output fed to the `gltf-export` binary as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::animation::AnimationClip;
use crate::error::{ExportError, Result};
use crate::material::Material;
use crate::vertex::Semantic;

/// Complete scene handed over by the traversal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneInput {
    pub meshes: Vec<MeshInput>,
    pub materials: Vec<Material>,
    pub images: Vec<ImageInput>,
    pub shaders: Vec<ShaderInput>,
    pub nodes: Vec<NodeInput>,
    pub animations: Vec<AnimationClip>,
}

impl SceneInput {
    /// Parse a scene from a JSON document on disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
        Self::from_json(&text)
    }

    /// Parse a scene from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Element arrays of one mesh shape.
///
/// Components are stored sequentially, e.g. `[x0, y0, z0, x1, y1, z1, ...]`.
/// Shape 0 is the base shape; later shapes are morph targets holding deltas and
/// may only carry positions and normals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeElements {
    pub name: Option<String>,
    /// Initial morph weight (ignored for the base shape)
    pub weight: f32,
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub colors: Vec<Vec<f32>>,
    pub texcoords: Vec<Vec<f32>>,
    pub tangents: Vec<Vec<f32>>,
}

impl ShapeElements {
    /// Component arrays of `semantic`, one per set index
    pub fn sets(&self, semantic: Semantic) -> Vec<&[f32]> {
        match semantic {
            Semantic::Position => single(&self.positions),
            Semantic::Normal => single(&self.normals),
            Semantic::Color => self.colors.iter().map(Vec::as_slice).collect(),
            Semantic::TexCoord => self.texcoords.iter().map(Vec::as_slice).collect(),
            Semantic::Tangent => self.tangents.iter().map(Vec::as_slice).collect(),
        }
    }
}

fn single<T>(values: &[T]) -> Vec<&[T]> {
    if values.is_empty() {
        Vec::new()
    } else {
        vec![values]
    }
}

/// Per-corner element indices, one list per semantic/set.
///
/// `null` means the corner has no element of that semantic/set (e.g. a face
/// without UVs). An empty list means the semantic/set does not exist at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerIndices {
    pub positions: Vec<Option<u32>>,
    pub normals: Vec<Option<u32>>,
    pub colors: Vec<Vec<Option<u32>>>,
    pub texcoords: Vec<Vec<Option<u32>>>,
    pub tangents: Vec<Vec<Option<u32>>>,
}

impl CornerIndices {
    /// Index lists of `semantic`, one per set index
    pub fn sets(&self, semantic: Semantic) -> Vec<&[Option<u32>]> {
        match semantic {
            Semantic::Position => single(&self.positions),
            Semantic::Normal => single(&self.normals),
            Semantic::Color => self.colors.iter().map(Vec::as_slice).collect(),
            Semantic::TexCoord => self.texcoords.iter().map(Vec::as_slice).collect(),
            Semantic::Tangent => self.tangents.iter().map(Vec::as_slice).collect(),
        }
    }

    /// Number of triangle corners
    pub fn corner_count(&self) -> usize {
        self.positions.len()
    }
}

/// One mesh as extracted by the traversal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshInput {
    pub name: String,
    pub shapes: Vec<ShapeElements>,
    pub indices: CornerIndices,
    /// Shader attached to each triangle (`null` = unshaded); empty = all unshaded
    pub triangle_shaders: Vec<Option<u32>>,
    /// Mesh-local shader index -> scene material index
    pub shaders: Vec<usize>,
}

impl MeshInput {
    pub fn triangle_count(&self) -> usize {
        self.indices.corner_count() / 3
    }

    /// Shader attached to triangle `triangle`
    pub fn shader_of(&self, triangle: usize) -> Option<u32> {
        self.triangle_shaders.get(triangle).copied().flatten()
    }

    /// Morph-target shapes (everything after the base shape)
    pub fn morph_shapes(&self) -> &[ShapeElements] {
        self.shapes.get(1..).unwrap_or(&[])
    }
}

/// Image referenced by materials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageInput {
    pub name: Option<String>,
    /// Relative URI the image is written to when not embedded
    pub uri: String,
    pub mime_type: Option<String>,
    /// File to read the image bytes from, relative to the scene document
    pub source: Option<PathBuf>,
}

impl ImageInput {
    /// Read the image bytes; a missing `source` yields zero-length data
    pub fn load(&self, base_dir: &Path) -> Result<Vec<u8>> {
        match &self.source {
            Some(source) => {
                let path = base_dir.join(source);
                fs::read(&path).map_err(|e| ExportError::io(path, e))
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Loose shader source shipped next to the document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderInput {
    pub uri: String,
    pub source: String,
}

/// Scene graph node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeInput {
    pub name: Option<String>,
    pub mesh: Option<usize>,
    pub translation: Option<[f32; 3]>,
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
    pub children: Vec<usize>,
}
