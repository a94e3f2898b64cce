use std::num::NonZeroU32;

/// Write-once slot allocator for one namespace of a single link, e.g.
/// attribute locations or binding slots.
///
/// Slots only ever leave the free list. A fresh allocator is created for
/// every namespace of every link.
#[derive(Debug)]
pub struct LocationAllocator {
    free_ranges: Vec<FreeRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FreeRange {
    location: u32,
    size: u32,
}

impl FreeRange {
    fn end(&self) -> u64 {
        self.location as u64 + self.size as u64
    }
}

impl LocationAllocator {
    pub fn new(capacity: u32) -> Self {
        let mut free_ranges = Vec::with_capacity(4);

        if capacity != 0 {
            free_ranges.push(FreeRange {
                location: 0,
                size: capacity,
            });
        }

        Self { free_ranges }
    }

    /// Takes `size` slots from the lowest free range large enough to hold
    /// them and returns the first slot.
    pub fn allocate(&mut self, size: NonZeroU32) -> Option<u32> {
        let size = size.get();
        let index = self
            .free_ranges
            .iter()
            .position(|range| size <= range.size)?;
        let range = self.free_ranges[index];

        if size < range.size {
            self.free_ranges[index] = FreeRange {
                location: range.location + size,
                size: range.size - size,
            };
        } else {
            self.free_ranges.remove(index);
        }

        Some(range.location)
    }

    /// Carves exactly `[location, location + size)` out of the free list.
    /// Fails when any slot of that interval is already taken.
    pub fn reserve(&mut self, location: u32, size: NonZeroU32) -> bool {
        let end = location as u64 + size.get() as u64;
        let index = match self
            .free_ranges
            .iter()
            .position(|range| range.location <= location && end <= range.end())
        {
            Some(index) => index,
            None => {
                return false;
            }
        };
        let range = self.free_ranges.remove(index);

        // `end <= range.end()` keeps both leftovers within `u32`.
        let mut leftovers = Vec::with_capacity(2);

        if range.location < location {
            leftovers.push(FreeRange {
                location: range.location,
                size: location - range.location,
            });
        }

        if end < range.end() {
            leftovers.push(FreeRange {
                location: end as u32,
                size: (range.end() - end) as u32,
            });
        }

        self.free_ranges.splice(index..index, leftovers);

        true
    }

    #[cfg(test)]
    fn free_slot_count(&self) -> u64 {
        self.free_ranges.iter().map(|range| range.size as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(size: u32) -> NonZeroU32 {
        NonZeroU32::new(size).unwrap()
    }

    #[test]
    fn test_allocate_is_first_fit() {
        let mut allocator = LocationAllocator::new(16);

        assert_eq!(allocator.allocate(size(1)), Some(0));
        assert_eq!(allocator.allocate(size(4)), Some(1));
        assert_eq!(allocator.allocate(size(2)), Some(5));
        assert_eq!(allocator.free_slot_count(), 9);
    }

    #[test]
    fn test_allocate_fails_without_room() {
        let mut allocator = LocationAllocator::new(4);

        assert_eq!(allocator.allocate(size(3)), Some(0));
        assert_eq!(allocator.allocate(size(2)), None);
        assert_eq!(allocator.allocate(size(1)), Some(3));
        assert_eq!(allocator.allocate(size(1)), None);
    }

    #[test]
    fn test_reserve_splits_range() {
        let mut allocator = LocationAllocator::new(8);

        assert!(allocator.reserve(3, size(2)));
        assert_eq!(allocator.free_slot_count(), 6);

        // the hole before the reservation is still handed out first
        assert_eq!(allocator.allocate(size(2)), Some(0));
        assert_eq!(allocator.allocate(size(2)), Some(5));
        assert_eq!(allocator.allocate(size(1)), Some(2));
        assert_eq!(allocator.allocate(size(1)), Some(7));
        assert_eq!(allocator.allocate(size(1)), None);
    }

    #[test]
    fn test_allocation_skips_holes_too_small() {
        let mut allocator = LocationAllocator::new(8);

        assert!(allocator.reserve(1, size(1)));
        assert_eq!(allocator.allocate(size(4)), Some(2));
        assert_eq!(allocator.allocate(size(1)), Some(0));
    }

    #[test]
    fn test_reserve_rejects_taken_slots() {
        let mut allocator = LocationAllocator::new(8);

        assert!(allocator.reserve(2, size(2)));
        assert!(!allocator.reserve(2, size(1)));
        assert!(!allocator.reserve(3, size(1)));
        // straddles the reserved interval
        assert!(!allocator.reserve(1, size(2)));
        assert!(allocator.reserve(1, size(1)));
        assert!(allocator.reserve(4, size(4)));
        assert!(!allocator.reserve(7, size(2)));
        assert_eq!(allocator.free_slot_count(), 1);
    }

    #[test]
    fn test_reserve_at_range_edges() {
        let mut allocator = LocationAllocator::new(4);

        assert!(allocator.reserve(0, size(1)));
        assert!(allocator.reserve(3, size(1)));
        assert_eq!(allocator.allocate(size(2)), Some(1));
        assert_eq!(allocator.free_slot_count(), 0);
    }

    #[test]
    fn test_full_capacity() {
        let mut allocator = LocationAllocator::new(u32::MAX);

        assert!(allocator.reserve(u32::MAX - 1, size(1)));
        assert!(!allocator.reserve(u32::MAX - 1, size(2)));
        assert_eq!(allocator.allocate(size(2)), Some(0));
    }

    #[test]
    fn test_empty_allocator() {
        let mut allocator = LocationAllocator::new(0);

        assert_eq!(allocator.allocate(size(1)), None);
        assert!(!allocator.reserve(0, size(1)));
    }
}
