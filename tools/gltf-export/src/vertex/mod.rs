//! Vertex deduplication
//!
//! Corners are partitioned by [`VertexSignature`] and deduplicated within each
//! partition by the exact bits of their components.

mod buffer;
mod slot;
mod table;

pub use buffer::VertexBuffer;
pub use slot::{
    MAX_SLOTS, Semantic, SetIndex, ShaderIndex, ShapeIndex, SlotUsage, VertexLayout,
    VertexSignature, VertexSlot,
};
pub use table::VertexBufferTable;
