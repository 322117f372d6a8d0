use slotmap::SlotMap;

use crate::key::{NodeKey, SlotHandle, Stamp};

/// Visit order of the four quadrants; `(x, y)` picks the upper half on each axis when 1.
pub(crate) const QUADRANTS: [(usize, usize); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];

#[derive(Debug)]
pub(crate) struct Node {
    pub x: u32,
    pub y: u32,
    pub size: u32,
    pub max_free: u32,
    pub stamp: Stamp,
    // Some only on leaves that are live allocations.
    pub id: Option<SlotHandle>,
    pub parent: Option<NodeKey>,
    pub children: [[Option<NodeKey>; 2]; 2],
}

impl Node {
    fn new(x: u32, y: u32, size: u32, parent: Option<NodeKey>) -> Self {
        Self {
            x,
            y,
            size,
            max_free: size / 2,
            stamp: Stamp::new(0),
            id: None,
            parent,
            children: [[None; 2]; 2],
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.iter().flatten().all(Option::is_none)
    }

    pub fn is_pinned(&self) -> bool {
        self.id.is_some() && self.stamp.is_pinned()
    }

    pub fn child(&self, (qx, qy): (usize, usize)) -> Option<NodeKey> {
        self.children[qx][qy]
    }

    pub fn subnodes(&self) -> impl Iterator<Item = NodeKey> + '_ {
        QUADRANTS
            .iter()
            .filter_map(|&quadrant| self.child(quadrant))
    }

    /// Clears the child slot holding `key`. The caller owns removal from the arena.
    pub fn unlink_subnode(&mut self, key: NodeKey) {
        for slot in self.children.iter_mut().flatten() {
            if *slot == Some(key) {
                *slot = None;
            }
        }
    }

    fn quadrant_origin(&self, (qx, qy): (usize, usize)) -> (u32, u32) {
        let half = self.size / 2;
        (self.x + qx as u32 * half, self.y + qy as u32 * half)
    }
}

/// Arena of quadtree nodes over a square power-of-two domain.
///
/// The root covers the whole domain, is created once and is never removed.
#[derive(Debug)]
pub(crate) struct QuadTree {
    nodes: SlotMap<NodeKey, Node>,
    root: NodeKey,
    dimension: u32,
}

impl QuadTree {
    pub fn new(dimension: u32) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new(0, 0, dimension, None));
        Self {
            nodes,
            root,
            dimension,
        }
    }

    pub const fn root(&self) -> NodeKey {
        self.root
    }

    pub const fn dimension(&self) -> u32 {
        self.dimension
    }

    pub fn node(&self, key: NodeKey) -> &Node {
        &self.nodes[key]
    }

    pub fn node_mut(&mut self, key: NodeKey) -> &mut Node {
        &mut self.nodes[key]
    }

    #[cfg(test)]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Creates the half-size child of `parent` in `quadrant`.
    pub fn insert_child(&mut self, parent: NodeKey, quadrant: (usize, usize)) -> NodeKey {
        let parent_node = &self.nodes[parent];
        assert!(
            parent_node.child(quadrant).is_none(),
            "quadrant is already occupied"
        );
        let (x, y) = parent_node.quadrant_origin(quadrant);
        let size = parent_node.size / 2;
        let child = self.nodes.insert(Node::new(x, y, size, Some(parent)));
        self.nodes[parent].children[quadrant.0][quadrant.1] = Some(child);
        child
    }

    /// Unlinks a childless non-root node from its parent and drops it.
    /// Returns the parent, or `None` when `key` is the root or still has children.
    pub fn remove_leaf(&mut self, key: NodeKey) -> Option<NodeKey> {
        let node = &self.nodes[key];
        if !node.is_leaf() {
            return None;
        }
        let parent = node.parent?;
        self.nodes[parent].unlink_subnode(key);
        self.nodes.remove(key);
        Some(parent)
    }

    pub fn min_stamp(&self, key: NodeKey) -> Stamp {
        let node = &self.nodes[key];
        if node.is_leaf() {
            return node.stamp;
        }
        node.subnodes()
            .map(|child| self.nodes[child].stamp)
            .min()
            .unwrap_or(Stamp::PINNED)
    }

    /// Direct child with the smallest stamp; the first quadrant wins ties.
    pub fn min_stamp_node(&self, key: NodeKey) -> Option<NodeKey> {
        let mut best: Option<(NodeKey, Stamp)> = None;
        for child in self.nodes[key].subnodes() {
            let stamp = self.nodes[child].stamp;
            match best {
                Some((_, best_stamp)) if best_stamp <= stamp => {}
                _ => best = Some((child, stamp)),
            }
        }
        best.map(|(child, _)| child)
    }

    pub fn get_max_free(&self, key: NodeKey) -> u32 {
        let node = &self.nodes[key];
        if node.id.is_some() {
            return 0;
        }
        let half = node.size / 2;
        QUADRANTS
            .iter()
            .map(|&quadrant| match node.child(quadrant) {
                Some(child) => self.nodes[child].max_free,
                None => half,
            })
            .max()
            .unwrap_or(0)
    }

    /// Largest block the root would offer once every unpinned allocation is freed.
    pub fn max_free_after_eviction(&self) -> u32 {
        self.reclaimable_max_free(self.root).unwrap_or(self.dimension / 2)
    }

    // None when freeing the unpinned leaves would remove `key` entirely.
    fn reclaimable_max_free(&self, key: NodeKey) -> Option<u32> {
        let node = &self.nodes[key];
        if node.id.is_some() {
            return node.is_pinned().then_some(0);
        }
        let half = node.size / 2;
        let mut survives = false;
        let mut max_free = 0;
        for &quadrant in &QUADRANTS {
            let remaining = node
                .child(quadrant)
                .and_then(|child| self.reclaimable_max_free(child));
            if remaining.is_some() {
                survives = true;
            }
            max_free = max_free.max(remaining.unwrap_or(half));
        }
        survives.then_some(max_free)
    }

    /// Recomputes `max_free` and `stamp` on `key` and every ancestor up to the root.
    pub fn update_tree(&mut self, key: NodeKey) {
        let mut current = Some(key);
        while let Some(key) = current {
            let max_free = self.get_max_free(key);
            let stamp = self.min_stamp(key);
            let node = &mut self.nodes[key];
            node.max_free = max_free;
            node.stamp = stamp;
            current = node.parent;
        }
    }

    /// Checks every structural invariant of the tree, panicking on the first violation.
    #[cfg(test)]
    pub fn validate(&self) {
        let mut stack = vec![self.root];
        while let Some(key) = stack.pop() {
            let node = &self.nodes[key];
            assert!(node.size.is_power_of_two(), "node size must be a power of two");
            assert!(
                node.x + node.size <= self.dimension && node.y + node.size <= self.dimension,
                "node must lie inside the domain"
            );
            assert_eq!(
                node.max_free,
                self.get_max_free(key),
                "cached max_free must match children"
            );
            if node.is_leaf() {
                if key != self.root {
                    assert!(node.id.is_some(), "non-root leaf must be an allocation");
                }
            } else {
                assert!(node.id.is_none(), "allocation must be a leaf");
                assert_eq!(node.stamp, self.min_stamp(key), "stamp must match children");
            }
            for &quadrant in &QUADRANTS {
                let Some(child) = node.child(quadrant) else {
                    continue;
                };
                let child_node = &self.nodes[child];
                assert_eq!(child_node.parent, Some(key), "child must point at its parent");
                assert_eq!(child_node.size * 2, node.size, "child must be half its parent");
                assert_eq!(
                    (child_node.x, child_node.y),
                    node.quadrant_origin(quadrant),
                    "child origin must match its quadrant"
                );
                stack.push(child);
            }
        }
        let reachable = self.count_reachable();
        assert_eq!(reachable, self.nodes.len(), "arena must not hold detached nodes");
    }

    #[cfg(test)]
    pub fn allocation_count(&self) -> usize {
        self.nodes.values().filter(|node| node.id.is_some()).count()
    }

    #[cfg(test)]
    fn count_reachable(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self.root];
        while let Some(key) = stack.pop() {
            count += 1;
            stack.extend(self.nodes[key].subnodes());
        }
        count
    }
}
