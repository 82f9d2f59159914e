//! Device memory layout: heaps and the memory types that alias them.

use serde::{Deserialize, Serialize};

use super::flags::MemoryPropertyFlags;
use crate::error::{DeviceError, DeviceResult};
use crate::resource::MemorySelector;

/// Upper bound on memory types; type filters are 32-bit masks.
pub const MAX_MEMORY_TYPES: usize = 32;

/// A physical heap with a fixed byte capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryHeap {
    /// Capacity in bytes.
    pub size: u64,
    /// Heap lives in device memory.
    pub device_local: bool,
}

/// A memory type: property flags plus the heap it allocates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryType {
    pub flags: MemoryPropertyFlags,
    pub heap_index: u32,
}

/// Immutable memory layout of a device.
///
/// Several memory types may alias one heap. The layout is read once when the
/// device is opened and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLayout {
    heaps: Vec<MemoryHeap>,
    types: Vec<MemoryType>,
}

impl MemoryLayout {
    /// Build a layout, checking that every type points at an existing heap.
    ///
    /// # Errors
    ///
    /// `DeviceError::InvalidLayout` when there are no heaps, no types, more
    /// than 32 types, or a type references a missing heap.
    pub fn new(heaps: Vec<MemoryHeap>, types: Vec<MemoryType>) -> DeviceResult<Self> {
        if heaps.is_empty() {
            return Err(DeviceError::InvalidLayout("no memory heaps".to_string()));
        }
        if types.is_empty() {
            return Err(DeviceError::InvalidLayout("no memory types".to_string()));
        }
        if types.len() > MAX_MEMORY_TYPES {
            return Err(DeviceError::InvalidLayout(format!(
                "{} memory types, at most {} supported",
                types.len(),
                MAX_MEMORY_TYPES
            )));
        }
        if let Some((index, ty)) = types
            .iter()
            .enumerate()
            .find(|(_, ty)| ty.heap_index as usize >= heaps.len())
        {
            return Err(DeviceError::InvalidLayout(format!(
                "memory type {} references heap {} but only {} heaps exist",
                index,
                ty.heap_index,
                heaps.len()
            )));
        }
        Ok(Self { heaps, types })
    }

    pub fn heaps(&self) -> &[MemoryHeap] {
        &self.heaps
    }

    pub fn types(&self) -> &[MemoryType] {
        &self.types
    }

    /// Bitmask with one bit set per memory type.
    pub fn all_types_filter(&self) -> u32 {
        if self.types.len() >= MAX_MEMORY_TYPES {
            u32::MAX
        } else {
            (1u32 << self.types.len()) - 1
        }
    }

    /// Find the first memory type whose flags include `flags`.
    ///
    /// # Arguments
    ///
    /// * `flags` - Required property flags
    /// * `type_filter` - Bitmask of eligible type indices (bit `i` = type `i`)
    /// * `exclusive` - Only accept types whose flags equal `flags` exactly
    ///
    /// # Returns
    ///
    /// The lowest matching type index, or `None`.
    pub fn find_first_memtype_supports(
        &self,
        flags: MemoryPropertyFlags,
        type_filter: u32,
        exclusive: bool,
    ) -> Option<u32> {
        self.types
            .iter()
            .enumerate()
            .filter(|(index, _)| type_filter & (1u32 << index) != 0)
            .find(|(_, ty)| {
                if exclusive {
                    ty.flags == flags
                } else {
                    ty.flags.contains(flags)
                }
            })
            .map(|(index, _)| index as u32)
    }

    /// Property flags of the memory type at `index`.
    ///
    /// # Errors
    ///
    /// `DeviceError::MemoryTypeOutOfRange` for an unknown index.
    pub fn flags_of_memory_type_index(&self, index: u32) -> DeviceResult<MemoryPropertyFlags> {
        self.memory_type(index).map(|ty| ty.flags)
    }

    /// Memory type at `index`.
    pub fn memory_type(&self, index: u32) -> DeviceResult<&MemoryType> {
        self.types
            .get(index as usize)
            .ok_or(DeviceError::MemoryTypeOutOfRange {
                index,
                count: self.types.len(),
            })
    }

    /// Heap owning the memory type at `index`.
    pub fn heap_of_type(&self, index: u32) -> DeviceResult<u32> {
        self.memory_type(index).map(|ty| ty.heap_index)
    }

    /// Heap at `heap_index`.
    pub fn heap(&self, heap_index: u32) -> DeviceResult<&MemoryHeap> {
        self.heaps
            .get(heap_index as usize)
            .ok_or(DeviceError::HeapOutOfRange {
                index: heap_index,
                count: self.heaps.len(),
            })
    }

    /// Resolve a memory selector to a type index allowed by `type_filter`.
    ///
    /// Flag selectors take the first superset match, like
    /// [`find_first_memtype_supports`](Self::find_first_memtype_supports)
    /// with `exclusive = false`.
    ///
    /// # Errors
    ///
    /// - `MemoryTypeNotFound` when no eligible type carries the flags
    /// - `MemoryTypeOutOfRange` / `MemoryTypeNotAllowed` for bad explicit indices
    pub fn resolve(&self, selector: MemorySelector, type_filter: u32) -> DeviceResult<u32> {
        match selector {
            MemorySelector::Index(index) => {
                self.memory_type(index)?;
                if type_filter & (1u32 << index) == 0 {
                    return Err(DeviceError::MemoryTypeNotAllowed {
                        index,
                        filter: type_filter,
                    });
                }
                Ok(index)
            }
            MemorySelector::Flags(flags) => self
                .find_first_memtype_supports(flags, type_filter, false)
                .ok_or(DeviceError::MemoryTypeNotFound {
                    flags,
                    filter: type_filter,
                }),
        }
    }

    /// Bitmask of types whose flags include `flags`.
    pub fn types_with(&self, flags: MemoryPropertyFlags) -> u32 {
        self.types
            .iter()
            .enumerate()
            .filter(|(_, ty)| ty.flags.contains(flags))
            .fold(0u32, |mask, (index, _)| mask | (1u32 << index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn discrete_layout() -> MemoryLayout {
        let dl = MemoryPropertyFlags::DEVICE_LOCAL;
        let hv = MemoryPropertyFlags::HOST_VISIBLE;
        let hco = MemoryPropertyFlags::HOST_COHERENT;
        let hca = MemoryPropertyFlags::HOST_CACHED;
        MemoryLayout::new(
            vec![
                MemoryHeap { size: 8 * GIB, device_local: true },
                MemoryHeap { size: 16 * GIB, device_local: false },
            ],
            vec![
                MemoryType { flags: dl, heap_index: 0 },
                MemoryType { flags: hv | hco, heap_index: 1 },
                MemoryType { flags: hv | hco | hca, heap_index: 1 },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_find_first_superset_and_exclusive() {
        let layout = discrete_layout();
        let all = layout.all_types_filter();
        assert_eq!(all, 0b111);

        let hv = MemoryPropertyFlags::HOST_VISIBLE;
        assert_eq!(layout.find_first_memtype_supports(hv, all, false), Some(1));
        // No type is exactly HV.
        assert_eq!(layout.find_first_memtype_supports(hv, all, true), None);

        let hv_hca = hv | MemoryPropertyFlags::HOST_CACHED;
        assert_eq!(layout.find_first_memtype_supports(hv_hca, all, false), Some(2));

        // Filter out type 1.
        assert_eq!(layout.find_first_memtype_supports(hv, 0b101, false), Some(2));
        println!("[PASS] find_first_memtype_supports honours filter and exclusivity");
    }

    #[test]
    fn test_flags_and_heap_lookup() {
        let layout = discrete_layout();
        assert_eq!(
            layout.flags_of_memory_type_index(0).unwrap(),
            MemoryPropertyFlags::DEVICE_LOCAL
        );
        assert_eq!(layout.heap_of_type(2).unwrap(), 1);
        assert!(matches!(
            layout.flags_of_memory_type_index(7),
            Err(DeviceError::MemoryTypeOutOfRange { index: 7, count: 3 })
        ));
        assert!(layout.heap(5).is_err());
    }

    #[test]
    fn test_resolve_selectors() {
        let layout = discrete_layout();
        let all = layout.all_types_filter();
        assert_eq!(layout.resolve(MemorySelector::Index(1), all).unwrap(), 1);
        assert!(matches!(
            layout.resolve(MemorySelector::Index(1), 0b001),
            Err(DeviceError::MemoryTypeNotAllowed { index: 1, .. })
        ));
        assert!(matches!(
            layout.resolve(MemorySelector::Flags(MemoryPropertyFlags::PROTECTED), all),
            Err(DeviceError::MemoryTypeNotFound { .. })
        ));
        assert_eq!(layout.types_with(MemoryPropertyFlags::HOST_VISIBLE), 0b110);
    }

    #[test]
    fn test_rejects_dangling_heap_index() {
        let result = MemoryLayout::new(
            vec![MemoryHeap { size: GIB, device_local: true }],
            vec![MemoryType { flags: MemoryPropertyFlags::DEVICE_LOCAL, heap_index: 3 }],
        );
        assert!(matches!(result, Err(DeviceError::InvalidLayout(_))));
        println!("[PASS] Layout validation rejects dangling heap index");
    }
}
