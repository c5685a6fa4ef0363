//! Partitioning of a mesh's corners into per-signature vertex buffers

use indexmap::IndexMap;

use super::buffer::VertexBuffer;
use super::slot::{Semantic, SlotUsage, VertexLayout, VertexSignature, VertexSlot};
use crate::error::{ExportError, Result};
use crate::input::MeshInput;

/// One attribute stream resolved against the mesh input
struct Stream<'a> {
    slot: VertexSlot,
    components: &'a [f32],
    indices: &'a [Option<u32>],
}

impl Stream<'_> {
    fn element_count(&self) -> usize {
        self.components.len() / self.slot.dimension()
    }

    /// Components of the element referenced by `corner`, if any
    fn element(&self, corner: usize) -> Result<Option<&[f32]>> {
        let Some(index) = self.indices[corner] else {
            return Ok(None);
        };

        let available = self.element_count();
        if index as usize >= available {
            return Err(ExportError::IndexOutOfRange {
                corner,
                slot: self.slot,
                index,
                available,
            });
        }

        let dim = self.slot.dimension();
        let start = index as usize * dim;
        Ok(Some(&self.components[start..start + dim]))
    }
}

/// All vertex buffers of one mesh, keyed by signature in first-seen order
#[derive(Debug, Clone)]
pub struct VertexBufferTable {
    layout: VertexLayout,
    buffers: IndexMap<VertexSignature, VertexBuffer>,
    corner_count: usize,
}

impl VertexBufferTable {
    /// Walk every triangle corner of `mesh` and deduplicate it into the buffer
    /// of its signature.
    pub fn build(mesh: &MeshInput) -> Result<Self> {
        let streams = resolve_streams(mesh)?;
        let layout = VertexLayout::new(&mesh.name, streams.iter().map(|s| s.slot))?;
        debug_assert!(streams.iter().map(|s| s.slot).eq(layout.slots().iter().copied()));

        let mut buffers: IndexMap<VertexSignature, VertexBuffer> = IndexMap::new();
        let mut elements: Vec<(VertexSlot, &[f32])> = Vec::with_capacity(streams.len());
        let corner_count = mesh.indices.corner_count();

        for triangle in 0..mesh.triangle_count() {
            let shader = mesh.shader_of(triangle);

            for corner in triangle * 3..triangle * 3 + 3 {
                let mut usage = SlotUsage::EMPTY;
                elements.clear();

                for (bit, stream) in streams.iter().enumerate() {
                    if let Some(element) = stream.element(corner)? {
                        usage.insert(bit);
                        elements.push((stream.slot, element));
                    }
                }

                let signature = VertexSignature::new(shader, usage);
                let buffer = buffers
                    .entry(signature)
                    .or_insert_with(|| VertexBuffer::new(layout.slots_in(usage).copied()));
                buffer.push_corner(corner, &elements)?;
            }
        }

        tracing::debug!(
            "Mesh '{}': {} corners -> {} partition(s), {} unique vertices",
            mesh.name,
            corner_count,
            buffers.len(),
            buffers.values().map(VertexBuffer::unique_count).sum::<usize>()
        );

        Ok(Self {
            layout,
            buffers,
            corner_count,
        })
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn corner_count(&self) -> usize {
        self.corner_count
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Partitions in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&VertexSignature, &VertexBuffer)> + '_ {
        self.buffers.iter()
    }
}

/// Validate `mesh` and collect its streams in canonical slot order
fn resolve_streams(mesh: &MeshInput) -> Result<Vec<Stream<'_>>> {
    let context = || format!("mesh '{}'", mesh.name);
    let corner_count = mesh.indices.corner_count();

    if corner_count == 0 {
        return Err(ExportError::invalid(context(), "mesh has no triangles"));
    }
    if corner_count % 3 != 0 {
        return Err(ExportError::invalid(
            context(),
            format!("{corner_count} corners is not a whole number of triangles"),
        ));
    }
    if !mesh.triangle_shaders.is_empty() && mesh.triangle_shaders.len() != mesh.triangle_count() {
        return Err(ExportError::invalid(
            context(),
            format!(
                "{} triangle shader(s) for {} triangle(s)",
                mesh.triangle_shaders.len(),
                mesh.triangle_count()
            ),
        ));
    }
    if let Some(corner) = mesh.indices.positions.iter().position(Option::is_none) {
        return Err(ExportError::invalid(
            context(),
            format!("corner {corner} has no position"),
        ));
    }

    let Some(base) = mesh.shapes.first() else {
        return Err(ExportError::invalid(context(), "mesh has no base shape"));
    };

    let mut streams = Vec::new();

    for semantic in Semantic::ALL {
        let component_sets = base.sets(semantic);
        let index_sets = mesh.indices.sets(semantic);

        if component_sets.len() != index_sets.len() {
            return Err(ExportError::invalid(
                context(),
                format!(
                    "{} has {} component set(s) but {} index set(s)",
                    semantic.name(),
                    component_sets.len(),
                    index_sets.len()
                ),
            ));
        }

        for (set_index, (components, indices)) in component_sets.into_iter().zip(index_sets).enumerate() {
            let slot = VertexSlot::new(0, semantic, set_index as u32);
            streams.push(checked_stream(mesh, slot, components, indices)?);
        }
    }

    for (shape, morph) in mesh.morph_shapes().iter().enumerate() {
        let shape_index = shape as u32 + 1;

        if !morph.colors.is_empty() || !morph.texcoords.is_empty() || !morph.tangents.is_empty() {
            return Err(ExportError::invalid(
                context(),
                format!("morph shape {shape_index} may only carry positions and normals"),
            ));
        }
        if morph.positions.is_empty() {
            return Err(ExportError::invalid(
                context(),
                format!("morph shape {shape_index} has no position deltas"),
            ));
        }

        for semantic in Semantic::MORPH {
            let Some(components) = morph.sets(semantic).first().copied() else {
                continue;
            };
            let base_components = base.sets(semantic).first().copied().unwrap_or(&[]);
            if components.len() != base_components.len() {
                return Err(ExportError::invalid(
                    context(),
                    format!(
                        "morph shape {shape_index} has {} {} components, base shape has {}",
                        components.len(),
                        semantic.name(),
                        base_components.len()
                    ),
                ));
            }

            // Morph deltas are addressed through the base shape's indices
            let Some(indices) = mesh.indices.sets(semantic).first().copied() else {
                continue;
            };
            let slot = VertexSlot::new(shape_index, semantic, 0);
            streams.push(checked_stream(mesh, slot, components, indices)?);
        }
    }

    streams.sort_by_key(|s| s.slot);
    Ok(streams)
}

fn checked_stream<'a>(
    mesh: &MeshInput,
    slot: VertexSlot,
    components: &'a [f32],
    indices: &'a [Option<u32>],
) -> Result<Stream<'a>> {
    if components.len() % slot.dimension() != 0 {
        return Err(ExportError::ComponentCount {
            semantic: slot.semantic,
            set_index: slot.set_index,
            len: components.len(),
            dimension: slot.dimension(),
        });
    }

    let corner_count = mesh.indices.corner_count();
    if indices.len() != corner_count {
        return Err(ExportError::invalid(
            format!("mesh '{}'", mesh.name),
            format!(
                "{slot} has {} corner indices, expected {corner_count}",
                indices.len()
            ),
        ));
    }

    Ok(Stream {
        slot,
        components,
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{CornerIndices, ShapeElements};

    fn quad_mesh() -> MeshInput {
        // Two triangles sharing the edge (1, 2)
        MeshInput {
            name: "quad".to_string(),
            shapes: vec![ShapeElements {
                positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0],
                normals: vec![0.0, 0.0, 1.0],
                ..Default::default()
            }],
            indices: CornerIndices {
                positions: [0, 1, 2, 2, 1, 3].map(Some).to_vec(),
                normals: vec![Some(0); 6],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_shared_edge_is_deduplicated() {
        let table = VertexBufferTable::build(&quad_mesh()).unwrap();
        assert_eq!(table.len(), 1);

        let (signature, buffer) = table.iter().next().unwrap();
        assert_eq!(signature.shader, None);
        assert_eq!(signature.slot_usage.count(), 2);
        assert_eq!(buffer.unique_count(), 4);
        assert_eq!(buffer.indices(), &[0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn test_shaders_split_partitions() {
        let mut mesh = quad_mesh();
        mesh.triangle_shaders = vec![Some(0), Some(1)];

        let table = VertexBufferTable::build(&mesh).unwrap();
        assert_eq!(table.len(), 2);

        let shaders: Vec<_> = table.iter().map(|(s, _)| s.shader).collect();
        assert_eq!(shaders, vec![Some(0), Some(1)]);
        for (_, buffer) in table.iter() {
            assert_eq!(buffer.unique_count(), 3);
            assert_eq!(buffer.indices(), &[0, 1, 2]);
        }
    }

    #[test]
    fn test_missing_uvs_split_partitions() {
        let mut mesh = quad_mesh();
        mesh.shapes[0].texcoords = vec![vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]];
        mesh.indices.texcoords = vec![vec![Some(0), Some(1), Some(2), None, None, None]];

        let table = VertexBufferTable::build(&mesh).unwrap();
        assert_eq!(table.len(), 2);

        let uv = VertexSlot::new(0, Semantic::TexCoord, 0);
        let with_uv = table.iter().filter(|(_, b)| b.components(&uv).is_some()).count();
        assert_eq!(with_uv, 1);
    }

    #[test]
    fn test_morph_deltas_take_part_in_key() {
        let mut mesh = quad_mesh();
        // Vertex 1 and 3 get distinct deltas; everything else is zero
        let mut deltas = vec![0.0; 12];
        deltas[3] = 0.5;
        deltas[9] = 0.25;
        mesh.shapes.push(ShapeElements {
            positions: deltas,
            weight: 0.5,
            ..Default::default()
        });

        let table = VertexBufferTable::build(&mesh).unwrap();
        let (_, buffer) = table.iter().next().unwrap();
        let morph = VertexSlot::new(1, Semantic::Position, 0);
        assert_eq!(buffer.components(&morph).unwrap().len(), 12);
        assert_eq!(buffer.unique_count(), 4);
    }

    #[test]
    fn test_morph_size_mismatch_is_rejected() {
        let mut mesh = quad_mesh();
        mesh.shapes.push(ShapeElements {
            positions: vec![0.0; 6],
            ..Default::default()
        });
        let err = VertexBufferTable::build(&mesh).unwrap_err();
        assert!(matches!(err, ExportError::InvalidInput { .. }));
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let mut mesh = quad_mesh();
        mesh.indices.positions[5] = Some(9);
        let err = VertexBufferTable::build(&mesh).unwrap_err();
        assert!(matches!(
            err,
            ExportError::IndexOutOfRange {
                corner: 5,
                index: 9,
                available: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_partial_triangle_is_rejected() {
        let mut mesh = quad_mesh();
        mesh.indices.positions.pop();
        mesh.indices.normals.pop();
        assert!(VertexBufferTable::build(&mesh).is_err());
    }

    #[test]
    fn test_bad_component_count_is_rejected() {
        let mut mesh = quad_mesh();
        mesh.shapes[0].positions.push(1.0);
        let err = VertexBufferTable::build(&mesh).unwrap_err();
        assert!(matches!(
            err,
            ExportError::ComponentCount {
                semantic: Semantic::Position,
                ..
            }
        ));
    }
}
