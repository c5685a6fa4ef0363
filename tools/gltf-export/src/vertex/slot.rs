//! Vertex slot and signature model
//!
//! A [`VertexSlot`] names one attribute stream (shape x semantic x set index).
//! A [`VertexSignature`] names one output vertex-buffer partition: the shader
//! attached to a corner plus the set of slots the corner actually carries.

use std::fmt;

use crate::error::{ExportError, Result};

/// Index of a shader (material) within the mesh that uses it
pub type ShaderIndex = u32;

/// Index of a mesh shape: 0 is the base shape, >0 are morph targets
pub type ShapeIndex = u32;

/// Index of a color / texture-coordinate / tangent set
pub type SetIndex = u32;

/// Maximum number of slots a single mesh can use (bits in [`SlotUsage`])
pub const MAX_SLOTS: usize = 64;

/// Vertex attribute semantic.
///
/// Declaration order is the canonical semantic order used by [`VertexSlot`]'s `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Semantic {
    Position,
    Normal,
    Color,
    TexCoord,
    Tangent,
}

impl Semantic {
    /// All semantics in canonical order
    pub const ALL: [Semantic; 5] = [
        Semantic::Position,
        Semantic::Normal,
        Semantic::Color,
        Semantic::TexCoord,
        Semantic::Tangent,
    ];

    /// Semantics a morph-target shape may carry
    pub const MORPH: [Semantic; 2] = [Semantic::Position, Semantic::Normal];

    /// Number of float components per element
    pub const fn dimension(self) -> usize {
        match self {
            Semantic::Position | Semantic::Normal => 3,
            Semantic::TexCoord => 2,
            Semantic::Color | Semantic::Tangent => 4,
        }
    }

    /// Upper-case glTF base name
    pub const fn name(self) -> &'static str {
        match self {
            Semantic::Position => "POSITION",
            Semantic::Normal => "NORMAL",
            Semantic::Color => "COLOR",
            Semantic::TexCoord => "TEXCOORD",
            Semantic::Tangent => "TANGENT",
        }
    }
}

/// One attribute stream of a mesh.
///
/// Ordering is lexicographic over (shape, semantic, set index), which is the
/// canonical slot order used for dedup keys and accessor emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexSlot {
    pub shape_index: ShapeIndex,
    pub semantic: Semantic,
    pub set_index: SetIndex,
}

impl VertexSlot {
    pub const fn new(shape_index: ShapeIndex, semantic: Semantic, set_index: SetIndex) -> Self {
        Self {
            shape_index,
            semantic,
            set_index,
        }
    }

    /// Number of float components per element of this slot
    pub const fn dimension(&self) -> usize {
        self.semantic.dimension()
    }

    /// Whether this slot belongs to the base shape
    pub const fn is_base(&self) -> bool {
        self.shape_index == 0
    }
}

impl fmt::Display for VertexSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shape {} {}_{}",
            self.shape_index,
            self.semantic.name(),
            self.set_index
        )
    }
}

/// 64-bit mask of the layout slots present on a corner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotUsage(pub u64);

impl SlotUsage {
    pub const EMPTY: SlotUsage = SlotUsage(0);

    pub fn insert(&mut self, bit: usize) {
        debug_assert!(bit < MAX_SLOTS);
        self.0 |= 1u64 << bit;
    }

    pub fn contains(&self, bit: usize) -> bool {
        bit < MAX_SLOTS && self.0 & (1u64 << bit) != 0
    }

    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Set bit positions in ascending order
    pub fn bits(self) -> impl Iterator<Item = usize> {
        (0..MAX_SLOTS).filter(move |&bit| self.contains(bit))
    }
}

/// Identifies one output vertex-buffer partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexSignature {
    /// Shader attached to the corner's triangle, `None` when unshaded
    pub shader: Option<ShaderIndex>,
    pub slot_usage: SlotUsage,
}

impl VertexSignature {
    pub const fn new(shader: Option<ShaderIndex>, slot_usage: SlotUsage) -> Self {
        Self { shader, slot_usage }
    }
}

impl fmt::Display for VertexSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shader {
            Some(shader) => write!(f, "shader {} mask {:#018x}", shader, self.slot_usage.0),
            None => write!(f, "no shader mask {:#018x}", self.slot_usage.0),
        }
    }
}

/// All slots a mesh can carry, in canonical order; slot `i` owns usage bit `i`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    slots: Vec<VertexSlot>,
}

impl VertexLayout {
    /// Build a layout from any slot collection; duplicates are removed
    pub fn new(mesh: &str, slots: impl IntoIterator<Item = VertexSlot>) -> Result<Self> {
        let mut slots: Vec<VertexSlot> = slots.into_iter().collect();
        slots.sort();
        slots.dedup();

        if slots.len() > MAX_SLOTS {
            return Err(ExportError::TooManySlots {
                mesh: mesh.to_string(),
                count: slots.len(),
            });
        }

        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[VertexSlot] {
        &self.slots
    }

    /// Slots present in `usage`, in canonical order
    pub fn slots_in(&self, usage: SlotUsage) -> impl Iterator<Item = &VertexSlot> + '_ {
        usage.bits().filter_map(move |bit| self.slots.get(bit))
    }
}
