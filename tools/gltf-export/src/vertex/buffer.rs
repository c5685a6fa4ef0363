//! Per-signature vertex deduplication

use std::collections::BTreeMap;

use hashbrown::HashMap;

use super::slot::VertexSlot;
use crate::error::{ExportError, Result};

/// Concatenated component bit patterns of a corner, in canonical slot order.
///
/// Stored as raw `u32` bits so equality is exact: `0.0` and `-0.0` are distinct
/// keys, and identical NaN payloads compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct VertexKey(Vec<u32>);

impl VertexKey {
    fn from_elements(elements: &[&[f32]]) -> Self {
        let len = elements.iter().map(|e| e.len()).sum();
        let mut bits = Vec::with_capacity(len);
        for element in elements {
            bits.extend(element.iter().map(|c| c.to_bits()));
        }
        Self(bits)
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Deduplicated vertices of one [`VertexSignature`](super::VertexSignature) partition.
///
/// Invariants:
/// - every entry of `indices` is `< unique_count()`
/// - `components(slot).len() == slot.dimension() * unique_count()` for every slot
#[derive(Debug, Clone)]
pub struct VertexBuffer {
    slots: Vec<VertexSlot>,
    cache: HashMap<VertexKey, u32>,
    indices: Vec<u32>,
    components: BTreeMap<VertexSlot, Vec<f32>>,
}

impl VertexBuffer {
    /// Create an empty buffer carrying `slots` (sorted into canonical order)
    pub fn new(slots: impl IntoIterator<Item = VertexSlot>) -> Self {
        let mut slots: Vec<VertexSlot> = slots.into_iter().collect();
        slots.sort();
        slots.dedup();

        let components = slots.iter().map(|slot| (*slot, Vec::new())).collect();

        Self {
            slots,
            cache: HashMap::new(),
            indices: Vec::new(),
            components,
        }
    }

    /// Add one corner and return its output index.
    ///
    /// `elements` pairs every slot of this buffer with its components, in any
    /// order. The first corner seen with a given key defines the stored vertex;
    /// repeats reuse its index.
    pub fn push_corner(&mut self, corner: usize, elements: &[(VertexSlot, &[f32])]) -> Result<u32> {
        if elements.len() != self.slots.len() {
            return Err(ExportError::invalid(
                format!("corner {corner}"),
                format!(
                    "{} element(s) supplied for {} slot(s)",
                    elements.len(),
                    self.slots.len()
                ),
            ));
        }

        let mut ordered: Vec<&[f32]> = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let Some(&(_, element)) = elements.iter().find(|(s, _)| s == slot) else {
                return Err(ExportError::invalid(
                    format!("corner {corner}"),
                    format!("no components supplied for {slot}"),
                ));
            };
            if element.len() != slot.dimension() {
                return Err(ExportError::invalid(
                    format!("corner {corner}"),
                    format!(
                        "{slot} expects {} components, got {}",
                        slot.dimension(),
                        element.len()
                    ),
                ));
            }
            ordered.push(element);
        }

        let key = VertexKey::from_elements(&ordered);
        if key.is_empty() {
            return Err(ExportError::EmptyVertexKey { corner });
        }

        let index = match self.cache.get(&key) {
            Some(&index) => index,
            None => {
                let index = u32::try_from(self.cache.len()).map_err(|_| {
                    ExportError::invalid(
                        format!("corner {corner}"),
                        "more than u32::MAX unique vertices",
                    )
                })?;

                for (slot, element) in self.slots.iter().zip(&ordered) {
                    if let Some(stream) = self.components.get_mut(slot) {
                        stream.extend_from_slice(element);
                    }
                }
                self.cache.insert(key, index);
                index
            }
        };

        self.indices.push(index);
        Ok(index)
    }

    /// Slots carried by this buffer, canonical order
    pub fn slots(&self) -> &[VertexSlot] {
        &self.slots
    }

    /// Output index per corner, in traversal order
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of distinct vertices recorded
    pub fn unique_count(&self) -> usize {
        self.cache.len()
    }

    /// Largest output index, `None` while empty
    pub fn max_index(&self) -> Option<u32> {
        self.unique_count().checked_sub(1).map(|max| max as u32)
    }

    /// Flat components of `slot` for all unique vertices
    pub fn components(&self, slot: &VertexSlot) -> Option<&[f32]> {
        self.components.get(slot).map(Vec::as_slice)
    }

    /// (slot, components) pairs in canonical slot order
    pub fn streams(&self) -> impl Iterator<Item = (&VertexSlot, &[f32])> + '_ {
        self.components
            .iter()
            .map(|(slot, stream)| (slot, stream.as_slice()))
    }
}
