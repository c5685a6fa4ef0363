//! Typed accessors over an append-only byte arena

use gltf_json as json;
use gltf_json::validation::Checked::Valid;

use crate::error::{ExportError, Result};
use crate::vertex::Semantic;

/// Component type of an accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    U16,
    U32,
    F32,
}

impl ComponentType {
    pub const fn size(self) -> usize {
        match self {
            ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }

    fn to_json(self) -> json::accessor::ComponentType {
        match self {
            ComponentType::U16 => json::accessor::ComponentType::U16,
            ComponentType::U32 => json::accessor::ComponentType::U32,
            ComponentType::F32 => json::accessor::ComponentType::F32,
        }
    }
}

/// Element shape of an accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
}

impl ElementType {
    pub const fn components(self) -> usize {
        match self {
            ElementType::Scalar => 1,
            ElementType::Vec2 => 2,
            ElementType::Vec3 => 3,
            ElementType::Vec4 => 4,
        }
    }

    pub const fn for_semantic(semantic: Semantic) -> Self {
        match semantic {
            Semantic::Position | Semantic::Normal => ElementType::Vec3,
            Semantic::TexCoord => ElementType::Vec2,
            Semantic::Color | Semantic::Tangent => ElementType::Vec4,
        }
    }

    fn to_json(self) -> json::accessor::Type {
        match self {
            ElementType::Scalar => json::accessor::Type::Scalar,
            ElementType::Vec2 => json::accessor::Type::Vec2,
            ElementType::Vec3 => json::accessor::Type::Vec3,
            ElementType::Vec4 => json::accessor::Type::Vec4,
        }
    }
}

/// GPU buffer binding hint of a buffer view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    /// Vertex attributes
    Array,
    /// Triangle indices
    ElementArray,
}

impl BufferTarget {
    fn to_json(self) -> json::buffer::Target {
        match self {
            BufferTarget::Array => json::buffer::Target::ArrayBuffer,
            BufferTarget::ElementArray => json::buffer::Target::ElementArrayBuffer,
        }
    }
}

/// Width of an index accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWidth {
    U16,
    U32,
}

impl IndexWidth {
    /// 16-bit unless forced wide or `max_index` does not fit in a `u16`
    pub const fn select(force_32bit: bool, max_index: u32) -> Self {
        if !force_32bit && max_index <= u16::MAX as u32 {
            IndexWidth::U16
        } else {
            IndexWidth::U32
        }
    }

    pub const fn component_type(self) -> ComponentType {
        match self {
            IndexWidth::U16 => ComponentType::U16,
            IndexWidth::U32 => ComponentType::U32,
        }
    }
}

/// Position of an accessor within its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessorId(pub u32);

/// Typed view into an arena's bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub component_type: ComponentType,
    pub element_type: ElementType,
    pub count: usize,
    /// Offset within the owning arena (not the packed blob)
    pub byte_offset: usize,
    pub byte_length: usize,
    pub target: Option<BufferTarget>,
    pub min: Option<Vec<f32>>,
    pub max: Option<Vec<f32>>,
}

impl Accessor {
    /// JSON form, referencing `view` at offset 0
    pub fn to_json(&self, view: json::Index<json::buffer::View>) -> json::Accessor {
        json::Accessor {
            buffer_view: Some(view),
            byte_offset: Some(0u64.into()),
            count: self.count.into(),
            component_type: Valid(json::accessor::GenericComponentType(
                self.component_type.to_json(),
            )),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(self.element_type.to_json()),
            min: self.min.as_deref().map(bounds_json),
            max: self.max.as_deref().map(bounds_json),
            name: None,
            normalized: false,
            sparse: None,
        }
    }

    /// JSON buffer view covering this accessor's bytes at `blob_offset`
    pub fn view_json(&self, blob_offset: usize) -> json::buffer::View {
        json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: self.byte_length.into(),
            byte_offset: Some(blob_offset.into()),
            byte_stride: None,
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: self.target.map(|t| Valid(t.to_json())),
        }
    }
}

fn bounds_json(values: &[f32]) -> json::Value {
    json::Value::Array(values.iter().map(|&v| json::Value::from(v)).collect())
}

/// Append-only byte arena plus the accessors describing it.
///
/// Every accessor starts on a 4-byte boundary; issued offsets never move.
#[derive(Debug, Clone, Default)]
pub struct AccessorArena {
    data: Vec<u8>,
    accessors: Vec<Accessor>,
}

impl AccessorArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn accessors(&self) -> &[Accessor] {
        &self.accessors
    }

    pub fn get(&self, id: AccessorId) -> Option<&Accessor> {
        self.accessors.get(id.0 as usize)
    }

    /// Raw bytes of `accessor`
    pub fn bytes_of(&self, accessor: &Accessor) -> &[u8] {
        &self.data[accessor.byte_offset..accessor.byte_offset + accessor.byte_length]
    }

    /// Pack triangle indices at `width`
    pub fn push_indices(&mut self, indices: &[u32], width: IndexWidth) -> Result<AccessorId> {
        let offset = self.data.len();
        match width {
            IndexWidth::U16 => {
                for &index in indices {
                    let index = u16::try_from(index).map_err(|_| {
                        ExportError::invalid("index accessor", format!("index {index} exceeds 16 bits"))
                    })?;
                    self.data.extend_from_slice(&index.to_le_bytes());
                }
            }
            IndexWidth::U32 => {
                for &index in indices {
                    self.data.extend_from_slice(&index.to_le_bytes());
                }
            }
        }

        Ok(self.finish(Accessor {
            component_type: width.component_type(),
            element_type: ElementType::Scalar,
            count: indices.len(),
            byte_offset: offset,
            byte_length: self.data.len() - offset,
            target: Some(BufferTarget::ElementArray),
            min: None,
            max: None,
        }))
    }

    /// Pack flat float components as `element_type` elements.
    ///
    /// With `bounds`, component-wise min/max are recorded.
    pub fn push_floats(
        &mut self,
        element_type: ElementType,
        components: &[f32],
        target: Option<BufferTarget>,
        bounds: bool,
    ) -> Result<AccessorId> {
        let width = element_type.components();
        if components.len() % width != 0 {
            return Err(ExportError::invalid(
                "float accessor",
                format!(
                    "{} components do not form whole {:?} elements",
                    components.len(),
                    element_type
                ),
            ));
        }

        let offset = self.data.len();
        self.data.extend_from_slice(bytemuck::cast_slice(components));

        let (min, max) = if bounds && !components.is_empty() {
            let (min, max) = compute_bounds(components, width);
            (Some(min), Some(max))
        } else {
            (None, None)
        };

        Ok(self.finish(Accessor {
            component_type: ComponentType::F32,
            element_type,
            count: components.len() / width,
            byte_offset: offset,
            byte_length: self.data.len() - offset,
            target,
            min,
            max,
        }))
    }

    fn finish(&mut self, accessor: Accessor) -> AccessorId {
        let id = AccessorId(self.accessors.len() as u32);
        self.accessors.push(accessor);
        align_buffer(&mut self.data);
        id
    }
}

/// Component-wise bounds of flat `components` grouped by `width`
pub fn compute_bounds(components: &[f32], width: usize) -> (Vec<f32>, Vec<f32>) {
    let mut min = vec![f32::MAX; width];
    let mut max = vec![f32::MIN; width];

    for element in components.chunks_exact(width) {
        for (i, &c) in element.iter().enumerate() {
            min[i] = min[i].min(c);
            max[i] = max[i].max(c);
        }
    }

    (min, max)
}

/// Pad `buffer` with zeros to a 4-byte boundary
pub fn align_buffer(buffer: &mut Vec<u8>) {
    while buffer.len() % 4 != 0 {
        buffer.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_width_boundary() {
        assert_eq!(IndexWidth::select(false, 65535), IndexWidth::U16);
        assert_eq!(IndexWidth::select(false, 65536), IndexWidth::U32);
        assert_eq!(IndexWidth::select(false, 0), IndexWidth::U16);
    }

    #[test]
    fn test_force_32bit_always_wide() {
        assert_eq!(IndexWidth::select(true, 0), IndexWidth::U32);
        assert_eq!(IndexWidth::select(true, 65535), IndexWidth::U32);
        assert_eq!(IndexWidth::select(true, 70000), IndexWidth::U32);
    }

    #[test]
    fn test_element_type_for_semantic() {
        assert_eq!(ElementType::for_semantic(Semantic::Position), ElementType::Vec3);
        assert_eq!(ElementType::for_semantic(Semantic::Normal), ElementType::Vec3);
        assert_eq!(ElementType::for_semantic(Semantic::TexCoord), ElementType::Vec2);
        assert_eq!(ElementType::for_semantic(Semantic::Tangent), ElementType::Vec4);
        assert_eq!(ElementType::for_semantic(Semantic::Color), ElementType::Vec4);
    }

    #[test]
    fn test_u16_indices_are_aligned() {
        let mut arena = AccessorArena::new();
        let id = arena.push_indices(&[0, 1, 2], IndexWidth::U16).unwrap();

        let accessor = arena.get(id).unwrap();
        assert_eq!(accessor.byte_length, 6);
        assert_eq!(accessor.count, 3);
        assert_eq!(accessor.target, Some(BufferTarget::ElementArray));
        // 3 indices * 2 bytes = 6 bytes, aligned to 8
        assert_eq!(arena.data().len(), 8);
        assert_eq!(arena.bytes_of(accessor), &[0, 0, 1, 0, 2, 0]);
    }

    #[test]
    fn test_offsets_survive_growth() {
        let mut arena = AccessorArena::new();
        let a = arena.push_indices(&[0, 1, 2], IndexWidth::U16).unwrap();
        let b = arena
            .push_floats(ElementType::Vec3, &[1.0; 9], Some(BufferTarget::Array), false)
            .unwrap();
        let c = arena.push_indices(&[7; 1000], IndexWidth::U32).unwrap();

        assert_eq!(arena.get(a).unwrap().byte_offset, 0);
        assert_eq!(arena.get(b).unwrap().byte_offset, 8);
        assert_eq!(arena.get(c).unwrap().byte_offset, 44);
        assert_eq!(arena.bytes_of(arena.get(b).unwrap()).len(), 36);
    }

    #[test]
    fn test_bounds_are_component_wise() {
        let mut arena = AccessorArena::new();
        let id = arena
            .push_floats(
                ElementType::Vec3,
                &[0.0, 5.0, -1.0, 2.0, -3.0, 4.0],
                Some(BufferTarget::Array),
                true,
            )
            .unwrap();

        let accessor = arena.get(id).unwrap();
        assert_eq!(accessor.min.as_deref(), Some(&[0.0, -3.0, -1.0][..]));
        assert_eq!(accessor.max.as_deref(), Some(&[2.0, 5.0, 4.0][..]));
    }

    #[test]
    fn test_u16_overflow_is_rejected() {
        let mut arena = AccessorArena::new();
        assert!(arena.push_indices(&[65536], IndexWidth::U16).is_err());
    }

    #[test]
    fn test_partial_element_is_rejected() {
        let mut arena = AccessorArena::new();
        let err = arena
            .push_floats(ElementType::Vec2, &[1.0, 2.0, 3.0], None, false)
            .unwrap_err();
        assert!(matches!(err, ExportError::InvalidInput { .. }));
    }
}
