use std::collections::HashMap;
use std::fmt;

use log::{debug, trace};

use crate::config::{AtlasConfigError, validate_dimension};
use crate::key::{
    Counter, FIRST_HANDLE, FIRST_STAMP, NodeKey, SlotHandle, SlotTag, Stamp, StampTag,
};
use crate::layout::SlotInfo;
use crate::node::{QUADRANTS, QuadTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAllocError {
    ZeroSize,
    TooLarge { requested: u32, max: u32 },
    NoEvictionCandidate,
    AtlasFull,
}

impl fmt::Display for SlotAllocError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotAllocError::ZeroSize => write!(formatter, "slot size must be non-zero"),
            SlotAllocError::TooLarge { requested, max } => write!(
                formatter,
                "slot size {requested} exceeds the largest allocatable slot {max}"
            ),
            SlotAllocError::NoEvictionCandidate => {
                write!(formatter, "atlas has no evictable slot")
            }
            SlotAllocError::AtlasFull => write!(formatter, "atlas has no free slot of that size"),
        }
    }
}

impl std::error::Error for SlotAllocError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Eviction {
    Allowed,
    Forbidden,
}

/// Quadtree allocator handing out square power-of-two slots of a square domain.
///
/// When no free block of the requested size is reachable, the least recently
/// used slot is evicted and the search restarts from the root. Callers keep a
/// slot alive by calling [`SlotAllocator::refresh`] every frame they use it.
///
/// Freeing collapses empty ancestors upward but does not merge free sibling
/// quadrants into a larger block at the same level.
#[derive(Debug)]
pub struct SlotAllocator {
    tree: QuadTree,
    // handle table: exactly the live allocation leaves
    active: HashMap<SlotHandle, NodeKey>,
    handles: Counter<SlotTag>,
    stamps: Counter<StampTag>,
}

impl SlotAllocator {
    pub fn new(dimension: u32) -> Result<Self, AtlasConfigError> {
        validate_dimension(dimension)?;
        Ok(Self {
            tree: QuadTree::new(dimension),
            active: HashMap::new(),
            handles: Counter::starting_at(FIRST_HANDLE),
            stamps: Counter::starting_at(FIRST_STAMP),
        })
    }

    pub const fn dimension(&self) -> u32 {
        self.tree.dimension()
    }

    /// Largest slot this allocator can hand out. The root is always subdivided.
    pub const fn max_slot_size(&self) -> u32 {
        self.tree.dimension() / 2
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = SlotHandle> + '_ {
        self.active.keys().copied()
    }

    /// Rounds `size` up to the slot size that `alloc` would hand out.
    pub fn rounded_size(&self, size: u32) -> Result<u32, SlotAllocError> {
        if size == 0 {
            return Err(SlotAllocError::ZeroSize);
        }
        let max = self.max_slot_size();
        match size.checked_next_power_of_two() {
            Some(rounded) if rounded <= max => Ok(rounded),
            _ => Err(SlotAllocError::TooLarge {
                requested: size,
                max,
            }),
        }
    }

    /// Allocates a slot, evicting least recently used slots until one fits.
    pub fn alloc(&mut self, size: u32) -> Result<SlotHandle, SlotAllocError> {
        self.allocate(size, false, Eviction::Allowed)
    }

    /// Allocates a slot that `free_oldest` never selects. It stays until freed explicitly.
    pub fn alloc_pinned(&mut self, size: u32) -> Result<SlotHandle, SlotAllocError> {
        self.allocate(size, true, Eviction::Allowed)
    }

    /// Allocates without evicting anything; fails with `AtlasFull` instead.
    pub fn try_alloc(&mut self, size: u32) -> Result<SlotHandle, SlotAllocError> {
        self.allocate(size, false, Eviction::Forbidden)
    }

    fn allocate(
        &mut self,
        size: u32,
        pinned: bool,
        eviction: Eviction,
    ) -> Result<SlotHandle, SlotAllocError> {
        let rounded = self.rounded_size(size)?;
        let handle = self.alloc_id();

        loop {
            if let Some(key) = self.alloc_node(rounded, handle, pinned) {
                self.active.insert(handle, key);
                let node = self.tree.node(key);
                debug!(
                    "allocated slot {handle}: {}x{} at ({}, {})",
                    node.size, node.size, node.x, node.y
                );
                return Ok(handle);
            }
            if eviction == Eviction::Forbidden {
                return Err(SlotAllocError::AtlasFull);
            }
            // refuse before evicting anything when pinned slots alone block the request
            if rounded > self.tree.max_free_after_eviction() {
                debug!("no {rounded}x{rounded} block even after evicting every unpinned slot");
                return Err(SlotAllocError::NoEvictionCandidate);
            }
            debug!("no free {rounded}x{rounded} block, evicting least recently used slot");
            self.free_oldest()?;
        }
    }

    /// Single descent from the root looking for a block of exactly `size`.
    ///
    /// Intermediate nodes are created on the way down. Returns `None` without
    /// retrying when the current free-space bookkeeping has no such block.
    fn alloc_node(&mut self, size: u32, handle: SlotHandle, pinned: bool) -> Option<NodeKey> {
        let mut current = self.tree.root();

        loop {
            let node = self.tree.node(current);
            if size > node.max_free {
                return None;
            }
            let max_free = node.max_free;
            let children = node.children;
            trace!(
                "descend into {}x{} at ({}, {}), max_free {max_free}",
                node.size, node.size, node.x, node.y
            );

            let mut next = None;
            for &(qx, qy) in &QUADRANTS {
                match children[qx][qy] {
                    Some(child) if size <= self.tree.node(child).max_free => {
                        next = Some(child);
                        break;
                    }
                    None if size < max_free => {
                        next = Some(self.tree.insert_child(current, (qx, qy)));
                        break;
                    }
                    None if size == max_free => {
                        let leaf = self.tree.insert_child(current, (qx, qy));
                        let stamp = self.alloc_stamp(pinned);
                        let leaf_node = self.tree.node_mut(leaf);
                        leaf_node.id = Some(handle);
                        leaf_node.stamp = stamp;
                        self.tree.update_tree(leaf);
                        return Some(leaf);
                    }
                    _ => {}
                }
            }

            current = next?;
        }
    }

    /// Releases a slot. Unknown or stale handles are ignored.
    ///
    /// Returns whether a slot was released.
    pub fn free(&mut self, handle: SlotHandle) -> bool {
        let Some(key) = self.active.remove(&handle) else {
            return false;
        };

        let mut current = key;
        while let Some(parent) = self.tree.remove_leaf(current) {
            current = parent;
        }
        self.tree.update_tree(current);
        debug!("freed slot {handle}");
        true
    }

    /// Evicts the least recently used unpinned slot and returns its handle.
    pub fn free_oldest(&mut self) -> Result<SlotHandle, SlotAllocError> {
        let mut current = self.tree.root();
        while let Some(next) = self.tree.min_stamp_node(current) {
            current = next;
        }

        let node = self.tree.node(current);
        let handle = match node.id {
            Some(handle) if !node.is_pinned() => handle,
            _ => return Err(SlotAllocError::NoEvictionCandidate),
        };
        debug!("evicting slot {handle} (stamp {})", node.stamp);
        self.free(handle);
        Ok(handle)
    }

    /// Marks a slot as used now. Returns the same handle, or `None` if it is no longer live.
    pub fn refresh(&mut self, handle: SlotHandle) -> Option<SlotHandle> {
        let key = *self.active.get(&handle)?;
        if self.tree.node(key).is_pinned() {
            return Some(handle);
        }
        let stamp = self.alloc_stamp(false);
        self.tree.node_mut(key).stamp = stamp;
        self.tree.update_tree(key);
        Some(handle)
    }

    pub fn valid(&self, handle: SlotHandle) -> bool {
        self.active.contains_key(&handle)
    }

    pub fn info(&self, handle: SlotHandle) -> Option<SlotInfo> {
        let key = self.active.get(&handle)?;
        let node = self.tree.node(*key);
        Some(SlotInfo {
            x: node.x,
            y: node.y,
            size: node.size,
            dimension: self.dimension(),
        })
    }

    pub fn is_pinned(&self, handle: SlotHandle) -> bool {
        self.active
            .get(&handle)
            .is_some_and(|key| self.tree.node(*key).is_pinned())
    }

    fn alloc_id(&mut self) -> SlotHandle {
        self.handles.advance()
    }

    fn alloc_stamp(&mut self, pinned: bool) -> Stamp {
        if pinned {
            return Stamp::PINNED;
        }
        self.stamps.advance()
    }

    #[cfg(test)]
    pub(crate) fn tree(&self) -> &QuadTree {
        &self.tree
    }

    #[cfg(test)]
    pub(crate) fn stamp_of(&self, handle: SlotHandle) -> Option<Stamp> {
        let key = self.active.get(&handle)?;
        Some(self.tree.node(*key).stamp)
    }
}
