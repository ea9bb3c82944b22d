//! Surrogate ID allocation that avoids collisions with the target database.

/// Returns the offset applied to ids emitted on top of an existing maximum:
/// one past the maximum, or 1 when the target table is empty.
#[must_use]
pub fn offset_after(max_existing: Option<u64>) -> u64 {
    match max_existing {
        Some(max) => max + 1,
        None => 1,
    }
}

/// Monotone allocator for object_xref ids, seeded past the target's maximum.
///
/// Single-writer: exactly one component holds the allocator at a time.
#[derive(Debug)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    #[must_use]
    pub fn after_max(max_existing: Option<u64>) -> Self {
        Self {
            next: offset_after(max_existing),
        }
    }

    /// Hand out the next id, strictly greater than all previous ones.
    pub fn allocate(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}
