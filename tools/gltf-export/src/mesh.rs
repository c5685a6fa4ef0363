//! Exportable meshes: one primitive per vertex signature

use crate::error::{ExportError, Result};
use crate::input::MeshInput;
use crate::primitive::Primitive;
use crate::vertex::VertexBufferTable;

/// A mesh ready for packing
#[derive(Debug, Clone)]
pub struct ExportableMesh {
    pub name: String,
    /// Primitives in first-seen signature order, with their scene material
    pub primitives: Vec<(Primitive, Option<usize>)>,
    /// Initial morph weights, one per morph shape
    pub weights: Vec<f32>,
    pub corner_count: usize,
    /// Unique vertices over all primitives
    pub vertex_count: usize,
}

impl ExportableMesh {
    pub fn build(input: &MeshInput, force_32bit: bool) -> Result<Self> {
        let table = VertexBufferTable::build(input)?;
        Self::from_table(input, &table, force_32bit)
    }

    pub fn from_table(input: &MeshInput, table: &VertexBufferTable, force_32bit: bool) -> Result<Self> {
        let mut primitives = Vec::with_capacity(table.len());

        for (signature, buffer) in table.iter() {
            let material = match signature.shader {
                Some(shader) => Some(input.shaders.get(shader as usize).copied().ok_or_else(|| {
                    ExportError::invalid(
                        format!("mesh '{}'", input.name),
                        format!("shader {shader} has no material binding"),
                    )
                })?),
                None => None,
            };

            primitives.push((Primitive::build(*signature, buffer, force_32bit)?, material));
        }

        let weights = input.morph_shapes().iter().map(|shape| shape.weight).collect();

        Ok(Self {
            name: input.name.clone(),
            primitives,
            weights,
            corner_count: table.corner_count(),
            vertex_count: table.iter().map(|(_, b)| b.unique_count()).sum(),
        })
    }

    pub fn accessor_count(&self) -> usize {
        self.primitives
            .iter()
            .map(|(p, _)| p.arena().accessors().len())
            .sum()
    }
}
