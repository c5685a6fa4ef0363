//! Primitive building: one deduplicated vertex buffer -> packed accessors

use std::collections::BTreeMap;

use gltf_json as json;
use gltf_json::validation::Checked::Valid;

use crate::accessor::{AccessorArena, AccessorId, BufferTarget, ElementType, IndexWidth};
use crate::error::{ExportError, Result};
use crate::morph::{self, MorphTarget};
use crate::vertex::{Semantic, SetIndex, VertexBuffer, VertexSignature, VertexSlot};

/// glTF attribute name of a base-shape slot
pub fn attribute_name(semantic: Semantic, set_index: SetIndex) -> String {
    match semantic {
        Semantic::Position | Semantic::Normal | Semantic::Tangent => semantic.name().to_string(),
        Semantic::Color | Semantic::TexCoord => format!("{}_{}", semantic.name(), set_index),
    }
}

/// glTF JSON semantic of a base-shape slot; `None` for streams glTF cannot name
fn json_semantic(slot: &VertexSlot) -> Option<json::mesh::Semantic> {
    match (slot.semantic, slot.set_index) {
        (Semantic::Position, _) => Some(json::mesh::Semantic::Positions),
        (Semantic::Normal, _) => Some(json::mesh::Semantic::Normals),
        (Semantic::Tangent, 0) => Some(json::mesh::Semantic::Tangents),
        (Semantic::Tangent, _) => None,
        (Semantic::Color, set) => Some(json::mesh::Semantic::Colors(set)),
        (Semantic::TexCoord, set) => Some(json::mesh::Semantic::TexCoords(set)),
    }
}

/// One triangle list: an index accessor plus one accessor per base-shape slot.
///
/// All accessors live in the primitive's own arena until the asset packs them.
#[derive(Debug, Clone)]
pub struct Primitive {
    signature: VertexSignature,
    arena: AccessorArena,
    index_width: IndexWidth,
    indices: AccessorId,
    attributes: Vec<(VertexSlot, AccessorId)>,
    targets: Vec<MorphTarget>,
}

impl Primitive {
    pub fn build(signature: VertexSignature, buffer: &VertexBuffer, force_32bit: bool) -> Result<Self> {
        let Some(max_index) = buffer.max_index() else {
            return Err(ExportError::invalid(
                format!("primitive {signature}"),
                "vertex buffer holds no vertices",
            ));
        };

        let mut arena = AccessorArena::new();
        let index_width = IndexWidth::select(force_32bit, max_index);
        let indices = arena.push_indices(buffer.indices(), index_width)?;

        let mut attributes = Vec::new();
        for (slot, components) in buffer.streams() {
            if !slot.is_base() {
                continue;
            }
            if json_semantic(slot).is_none() {
                tracing::warn!("Skipping {slot}: glTF only carries one TANGENT set");
                continue;
            }

            let id = arena.push_floats(
                ElementType::for_semantic(slot.semantic),
                components,
                Some(BufferTarget::Array),
                slot.semantic == Semantic::Position,
            )?;
            attributes.push((*slot, id));
        }

        let targets = morph::push_targets(buffer, &mut arena)?;

        Ok(Self {
            signature,
            arena,
            index_width,
            indices,
            attributes,
            targets,
        })
    }

    pub fn signature(&self) -> &VertexSignature {
        &self.signature
    }

    pub fn arena(&self) -> &AccessorArena {
        &self.arena
    }

    pub fn index_width(&self) -> IndexWidth {
        self.index_width
    }

    pub fn indices(&self) -> AccessorId {
        self.indices
    }

    /// (slot, accessor) pairs in canonical slot order
    pub fn attributes(&self) -> &[(VertexSlot, AccessorId)] {
        &self.attributes
    }

    /// Attribute accessors keyed by glTF attribute name
    pub fn named_attributes(&self) -> impl Iterator<Item = (String, AccessorId)> + '_ {
        self.attributes
            .iter()
            .map(|(slot, id)| (attribute_name(slot.semantic, slot.set_index), *id))
    }

    pub fn targets(&self) -> &[MorphTarget] {
        &self.targets
    }

    /// JSON primitive; `resolve` maps local accessor ids to packed accessor indices
    pub fn to_json(
        &self,
        material: Option<json::Index<json::Material>>,
        resolve: impl Fn(AccessorId) -> json::Index<json::Accessor>,
    ) -> json::mesh::Primitive {
        let attributes: BTreeMap<_, _> = self
            .attributes
            .iter()
            .filter_map(|(slot, id)| json_semantic(slot).map(|s| (Valid(s), resolve(*id))))
            .collect();

        let targets = (!self.targets.is_empty()).then(|| {
            self.targets
                .iter()
                .map(|target| json::mesh::MorphTarget {
                    positions: target.position.map(&resolve),
                    normals: target.normal.map(&resolve),
                    tangents: None,
                })
                .collect()
        });

        json::mesh::Primitive {
            attributes,
            extensions: Default::default(),
            extras: Default::default(),
            indices: Some(resolve(self.indices)),
            material,
            mode: Valid(json::mesh::Mode::Triangles),
            targets,
        }
    }
}
