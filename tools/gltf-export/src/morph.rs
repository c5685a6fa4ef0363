//! Morph-target accessors
//!
//! Shapes above the base shape are carried through dedup as ordinary slots;
//! here their per-vertex deltas become the POSITION/NORMAL accessors of a
//! glTF primitive target.

use crate::accessor::{AccessorArena, AccessorId, BufferTarget, ElementType};
use crate::error::Result;
use crate::vertex::{Semantic, ShapeIndex, VertexBuffer, VertexSlot};

/// Delta accessors of one morph shape within one primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MorphTarget {
    pub shape_index: ShapeIndex,
    pub position: Option<AccessorId>,
    pub normal: Option<AccessorId>,
}

/// Append one target per morph shape of `buffer`, in shape order
pub fn push_targets(buffer: &VertexBuffer, arena: &mut AccessorArena) -> Result<Vec<MorphTarget>> {
    let mut shapes: Vec<ShapeIndex> = buffer
        .slots()
        .iter()
        .filter(|slot| !slot.is_base())
        .map(|slot| slot.shape_index)
        .collect();
    shapes.dedup();

    let mut targets = Vec::with_capacity(shapes.len());
    for shape_index in shapes {
        let mut target = MorphTarget {
            shape_index,
            position: None,
            normal: None,
        };

        for semantic in Semantic::MORPH {
            let slot = VertexSlot::new(shape_index, semantic, 0);
            let Some(deltas) = buffer.components(&slot) else {
                continue;
            };

            // glTF requires bounds on every POSITION accessor, targets included
            let bounds = semantic == Semantic::Position;
            let id = arena.push_floats(
                ElementType::for_semantic(semantic),
                deltas,
                Some(BufferTarget::Array),
                bounds,
            )?;

            match semantic {
                Semantic::Position => target.position = Some(id),
                _ => target.normal = Some(id),
            }
        }

        targets.push(target);
    }

    Ok(targets)
}
