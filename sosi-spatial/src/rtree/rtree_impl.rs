use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;
use sosi::common::{GroupRef, LayerMask};
use sosi::store::GroupStore;

use super::rtree_constants::{DEFAULT_FAN_OUT, INLINE_CHILDREN, MIN_FAN_OUT};
use super::rtree_types::{
    FlateHit, IndexChange, LeafHandle, NodeId, RTreeStats, SpatialError, SpatialResult,
};
use crate::{BoundingBox, SpatialStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Child {
    Node(NodeId),
    Leaf(LeafHandle),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    bbox: BoundingBox,
    /// Children are leaves rather than nodes.
    leaf_level: bool,
    children: SmallVec<[Child; INLINE_CHILDREN]>,
}

impl Node {
    fn empty(parent: Option<NodeId>, leaf_level: bool) -> Self {
        Node {
            parent,
            bbox: BoundingBox::inverted(),
            leaf_level,
            children: SmallVec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct LeafSlot {
    generation: u32,
    live: bool,
    parent: NodeId,
    bbox: BoundingBox,
    group: GroupRef,
}

/// In-memory R-tree over group bounding boxes.
///
/// Nodes and leaves live in two arenas and refer to their parents by index,
/// so deleting a node never leaves a dangling reference. At most one leaf
/// exists per group; the group-to-leaf map makes `leaf_of` O(1).
///
/// Insertion descends by least enlargement (ties by smaller resulting area,
/// then first child) and splits overflowing nodes with a linear split on the
/// east axis. Deletion prunes emptied nodes and re-unions every ancestor but
/// never redistributes siblings.
///
/// # Examples
///
/// ```rust
/// use sosi::common::GroupRef;
/// use sosi_spatial::{BoundingBox, SpatialIndex};
///
/// let mut index = SpatialIndex::new();
/// let g1 = GroupRef::new(1, 1);
/// let g2 = GroupRef::new(1, 2);
/// index.insert(g1, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
/// index.insert(g2, BoundingBox::new(5.0, 5.0, 6.0, 6.0));
///
/// let hits: Vec<_> = index.query(&BoundingBox::new(0.0, 0.0, 2.0, 2.0)).collect();
/// assert_eq!(hits, vec![g1]);
/// ```
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    fan_out: usize,
    root: NodeId,
    nodes: Vec<Node>,
    free_nodes: Vec<NodeId>,
    leaves: Vec<LeafSlot>,
    free_leaves: Vec<usize>,
    by_group: HashMap<GroupRef, LeafHandle>,
    reference_boxes: HashSet<GroupRef>,
    splits: u64,
    pruned_nodes: u64,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        SpatialIndex::new()
    }
}

impl SpatialIndex {
    /// Creates an empty index with the default fan-out of 3.
    pub fn new() -> Self {
        SpatialIndex {
            fan_out: DEFAULT_FAN_OUT,
            root: NodeId(0),
            nodes: vec![Node::empty(None, true)],
            free_nodes: Vec::new(),
            leaves: Vec::new(),
            free_leaves: Vec::new(),
            by_group: HashMap::new(),
            reference_boxes: HashSet::new(),
            splits: 0,
            pruned_nodes: 0,
        }
    }

    /// Creates an empty index whose nodes hold at most `fan_out` children.
    pub fn with_fan_out(fan_out: usize) -> SpatialResult<Self> {
        if fan_out < MIN_FAN_OUT {
            log::error!("R-tree fan-out must be at least {}, got {}", MIN_FAN_OUT, fan_out);
            return Err(SpatialError::InvalidOperation(format!(
                "R-tree fan-out must be at least {}, got {}",
                MIN_FAN_OUT, fan_out
            )));
        }
        let mut index = SpatialIndex::new();
        index.fan_out = fan_out;
        Ok(index)
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    pub fn len(&self) -> usize {
        self.by_group.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_group.is_empty()
    }

    /// Number of node levels. An empty tree has height 1.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut id = self.root;
        while !self.nodes[id.0].leaf_level {
            match self.nodes[id.0].children.first() {
                Some(Child::Node(child)) => {
                    id = *child;
                    height += 1;
                }
                _ => break,
            }
        }
        height
    }

    pub fn stats(&self) -> RTreeStats {
        RTreeStats {
            entries: self.len(),
            nodes: self.nodes.len() - self.free_nodes.len(),
            height: self.height(),
            splits: self.splits,
            pruned_nodes: self.pruned_nodes,
        }
    }

    /// Box covering every indexed group, or `None` for an empty index.
    pub fn extent(&self) -> Option<BoundingBox> {
        let bbox = self.nodes[self.root.0].bbox;
        bbox.is_valid().then_some(bbox)
    }

    // ========================================================================
    // Leaf lookup
    // ========================================================================

    pub fn leaf_of(&self, group: GroupRef) -> Option<LeafHandle> {
        self.by_group.get(&group).copied()
    }

    pub fn leaf_box(&self, handle: LeafHandle) -> SpatialResult<BoundingBox> {
        self.validate(handle).map(|slot| slot.bbox)
    }

    pub fn leaf_group(&self, handle: LeafHandle) -> SpatialResult<GroupRef> {
        self.validate(handle).map(|slot| slot.group)
    }

    /// Box stored for `group`, if it is indexed.
    pub fn group_box(&self, group: GroupRef) -> Option<BoundingBox> {
        self.leaf_of(group).map(|h| self.leaves[h.slot].bbox)
    }

    /// Whether `group` was indexed through [`index_flate`](Self::index_flate).
    pub fn has_reference_box(&self, group: GroupRef) -> bool {
        self.reference_boxes.contains(&group)
    }

    fn validate(&self, handle: LeafHandle) -> SpatialResult<&LeafSlot> {
        match self.leaves.get(handle.slot) {
            Some(slot) if slot.live && slot.generation == handle.generation => Ok(slot),
            _ => {
                log::error!("Stale or unknown R-tree leaf handle {}", handle);
                Err(SpatialError::InvalidHandle(handle))
            }
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Adds a leaf for `group`. A group that is already indexed is moved.
    pub fn insert(&mut self, group: GroupRef, bbox: BoundingBox) -> LeafHandle {
        match self.leaf_of(group) {
            Some(existing) => self.relocate(existing, group, bbox),
            None => self.place(group, bbox),
        }
    }

    /// Moves a leaf to a new box. The old handle is stale afterwards.
    ///
    /// A polygon keeps its reference-box mark.
    pub fn update(&mut self, handle: LeafHandle, bbox: BoundingBox) -> SpatialResult<LeafHandle> {
        let group = self.validate(handle)?.group;
        Ok(self.relocate(handle, group, bbox))
    }

    /// Removes a leaf and returns the group it indexed.
    pub fn delete(&mut self, handle: LeafHandle) -> SpatialResult<GroupRef> {
        self.validate(handle)?;
        Ok(self.remove_leaf(handle))
    }

    /// Removes the leaf of `group`. Returns false if it was not indexed.
    pub fn remove_group(&mut self, group: GroupRef) -> bool {
        match self.leaf_of(group) {
            Some(handle) => {
                self.remove_leaf(handle);
                true
            }
            None => false,
        }
    }

    /// Brings the leaf of `group` in line with its current box.
    ///
    /// `None` removes the leaf. An unchanged box leaves the tree untouched.
    pub fn index_group(&mut self, group: GroupRef, bbox: Option<BoundingBox>) -> IndexChange {
        match (self.leaf_of(group), bbox) {
            (Some(handle), None) => {
                self.remove_leaf(handle);
                IndexChange::Removed
            }
            (None, None) => IndexChange::NotIndexed,
            (Some(handle), Some(bbox)) if self.leaves[handle.slot].bbox == bbox => {
                IndexChange::Unchanged(handle)
            }
            (Some(handle), Some(bbox)) => IndexChange::Updated(self.relocate(handle, group, bbox)),
            (None, Some(bbox)) => IndexChange::Inserted(self.insert(group, bbox)),
        }
    }

    /// Indexes a polygon with the union of its own box and the boxes of its
    /// outer-ring members. Holes are left out.
    ///
    /// The polygon is marked as carrying a reference box only when at least
    /// one outer member contributed a box; otherwise the mark is cleared.
    pub fn index_flate<S: SpatialStore + ?Sized>(
        &mut self,
        store: &S,
        group: GroupRef,
    ) -> SpatialResult<IndexChange> {
        let members = store.boundary_members(group)?;
        let mut bbox = store.group_box(group);
        let mut used_reference = false;
        for member in members.iter().take_while(|m| !m.is_hole_start) {
            if let Some(member_box) = store.group_box(member.group) {
                bbox = Some(bbox.map_or(member_box, |b| b.union(&member_box)));
                used_reference = true;
            }
        }

        let change = self.index_group(group, bbox);
        if used_reference {
            self.reference_boxes.insert(group);
        } else {
            self.reference_boxes.remove(&group);
        }
        Ok(change)
    }

    /// Drops every leaf and node.
    pub fn clear(&mut self) {
        let fan_out = self.fan_out;
        *self = SpatialIndex::new();
        self.fan_out = fan_out;
    }

    fn alloc_leaf(&mut self, parent: NodeId, bbox: BoundingBox, group: GroupRef) -> LeafHandle {
        match self.free_leaves.pop() {
            Some(slot) => {
                let leaf = &mut self.leaves[slot];
                leaf.live = true;
                leaf.parent = parent;
                leaf.bbox = bbox;
                leaf.group = group;
                LeafHandle {
                    slot,
                    generation: leaf.generation,
                }
            }
            None => {
                self.leaves.push(LeafSlot {
                    generation: 0,
                    live: true,
                    parent,
                    bbox,
                    group,
                });
                LeafHandle {
                    slot: self.leaves.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    fn alloc_node(&mut self, node: Node) -> NodeId {
        match self.free_nodes.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn free_node(&mut self, id: NodeId) {
        self.nodes[id.0] = Node::empty(None, true);
        self.free_nodes.push(id);
    }

    fn child_box(&self, child: Child) -> BoundingBox {
        match child {
            Child::Node(id) => self.nodes[id.0].bbox,
            Child::Leaf(handle) => self.leaves[handle.slot].bbox,
        }
    }

    fn set_parent(&mut self, child: Child, parent: NodeId) {
        match child {
            Child::Node(id) => self.nodes[id.0].parent = Some(parent),
            Child::Leaf(handle) => self.leaves[handle.slot].parent = parent,
        }
    }

    fn children_box(&self, id: NodeId) -> BoundingBox {
        self.nodes[id.0]
            .children
            .iter()
            .fold(BoundingBox::inverted(), |acc, c| acc.union(&self.child_box(*c)))
    }

    fn recompute_box(&mut self, id: NodeId) {
        self.nodes[id.0].bbox = self.children_box(id);
    }

    fn choose_leaf_node(&self, bbox: &BoundingBox) -> NodeId {
        let mut id = self.root;
        loop {
            let node = &self.nodes[id.0];
            if node.leaf_level {
                return id;
            }

            let mut best: Option<(NodeId, f64, f64)> = None;
            for child in &node.children {
                if let Child::Node(child_id) = child {
                    let child_box = self.nodes[child_id.0].bbox;
                    let enlargement = child_box.enlargement_area(bbox);
                    let area = child_box.union(bbox).area();
                    let better = match best {
                        None => true,
                        Some((_, best_enlargement, best_area)) => {
                            enlargement < best_enlargement
                                || (enlargement == best_enlargement && area < best_area)
                        }
                    };
                    if better {
                        best = Some((*child_id, enlargement, area));
                    }
                }
            }

            match best {
                Some((child_id, _, _)) => id = child_id,
                None => return id,
            }
        }
    }

    /// Re-unions boxes from `start` to the root, splitting overflowing nodes.
    fn adjust_upward(&mut self, start: NodeId) {
        let mut id = start;
        loop {
            let sibling = if self.nodes[id.0].children.len() > self.fan_out {
                Some(self.split(id))
            } else {
                None
            };
            self.recompute_box(id);

            match self.nodes[id.0].parent {
                Some(parent) => {
                    if let Some(sibling) = sibling {
                        self.nodes[parent.0].children.push(Child::Node(sibling));
                    }
                    id = parent;
                }
                None => {
                    if let Some(sibling) = sibling {
                        self.grow_root(id, sibling);
                    }
                    return;
                }
            }
        }
    }

    fn grow_root(&mut self, old_root: NodeId, sibling: NodeId) {
        let mut root = Node::empty(None, false);
        root.children.push(Child::Node(old_root));
        root.children.push(Child::Node(sibling));
        let new_root = self.alloc_node(root);
        self.nodes[old_root.0].parent = Some(new_root);
        self.nodes[sibling.0].parent = Some(new_root);
        self.recompute_box(new_root);
        self.root = new_root;
        log::debug!("R-tree grew a new root, height is now {}", self.height());
    }

    /// Linear split. The entry reaching furthest east stays, the entry
    /// ending furthest west seeds the new sibling, and every other entry
    /// joins the side whose box stays smaller (the sibling on ties).
    fn split(&mut self, id: NodeId) -> NodeId {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        let boxes: Vec<BoundingBox> = children.iter().map(|c| self.child_box(*c)).collect();

        let mut east_seed = 0;
        for (i, bbox) in boxes.iter().enumerate() {
            if bbox.min_x > boxes[east_seed].min_x {
                east_seed = i;
            }
        }
        let mut west_seed: Option<usize> = None;
        for (i, bbox) in boxes.iter().enumerate() {
            if i != east_seed && west_seed.map_or(true, |w| bbox.max_x < boxes[w].max_x) {
                west_seed = Some(i);
            }
        }
        let west_seed = west_seed.unwrap_or(if east_seed == 0 { 1 } else { 0 });

        let parent = self.nodes[id.0].parent;
        let leaf_level = self.nodes[id.0].leaf_level;
        let sibling = self.alloc_node(Node::empty(parent, leaf_level));

        let mut keep: SmallVec<[Child; INLINE_CHILDREN]> = SmallVec::new();
        let mut keep_box = boxes[east_seed];
        keep.push(children[east_seed]);
        let mut moved: SmallVec<[Child; INLINE_CHILDREN]> = SmallVec::new();
        let mut moved_box = boxes[west_seed];
        moved.push(children[west_seed]);

        for (i, child) in children.iter().enumerate() {
            if i == east_seed || i == west_seed {
                continue;
            }
            let with_keep = keep_box.union(&boxes[i]);
            let with_moved = moved_box.union(&boxes[i]);
            if with_keep.area() < with_moved.area() {
                keep.push(*child);
                keep_box = with_keep;
            } else {
                moved.push(*child);
                moved_box = with_moved;
            }
        }

        for child in &moved {
            self.set_parent(*child, sibling);
        }
        self.nodes[id.0].children = keep;
        self.nodes[id.0].bbox = keep_box;
        self.nodes[sibling.0].children = moved;
        self.nodes[sibling.0].bbox = moved_box;

        self.splits += 1;
        log::debug!(
            "Split R-tree node {} into {} + {} children",
            id.0,
            self.nodes[id.0].children.len(),
            self.nodes[sibling.0].children.len()
        );
        sibling
    }

    fn place(&mut self, group: GroupRef, bbox: BoundingBox) -> LeafHandle {
        let target = self.choose_leaf_node(&bbox);
        let handle = self.alloc_leaf(target, bbox, group);
        self.nodes[target.0].children.push(Child::Leaf(handle));
        self.by_group.insert(group, handle);
        self.adjust_upward(target);
        handle
    }

    /// Re-inserts the leaf of `group` under a new box, keeping its
    /// reference-box mark.
    fn relocate(&mut self, handle: LeafHandle, group: GroupRef, bbox: BoundingBox) -> LeafHandle {
        let had_reference = self.reference_boxes.contains(&group);
        self.remove_leaf(handle);
        let moved = self.place(group, bbox);
        if had_reference {
            self.reference_boxes.insert(group);
        }
        moved
    }

    fn remove_leaf(&mut self, handle: LeafHandle) -> GroupRef {
        let (parent, group) = {
            let slot = &mut self.leaves[handle.slot];
            slot.live = false;
            slot.generation = slot.generation.wrapping_add(1);
            (slot.parent, slot.group)
        };
        self.free_leaves.push(handle.slot);
        if self.by_group.get(&group) == Some(&handle) {
            self.by_group.remove(&group);
            self.reference_boxes.remove(&group);
        }
        self.nodes[parent.0]
            .children
            .retain(|c| *c != Child::Leaf(handle));
        self.condense(parent);
        group
    }

    /// Prunes emptied nodes from `start` upwards and re-unions the rest.
    fn condense(&mut self, start: NodeId) {
        let mut id = start;
        loop {
            let parent = self.nodes[id.0].parent;
            if self.nodes[id.0].children.is_empty() {
                match parent {
                    Some(parent) => {
                        self.nodes[parent.0]
                            .children
                            .retain(|c| *c != Child::Node(id));
                        self.free_node(id);
                        self.pruned_nodes += 1;
                        log::debug!("Pruned empty R-tree node {}", id.0);
                        id = parent;
                        continue;
                    }
                    None => {
                        let root = &mut self.nodes[id.0];
                        root.leaf_level = true;
                        root.bbox = BoundingBox::inverted();
                        return;
                    }
                }
            }

            self.recompute_box(id);
            match parent {
                Some(parent) => id = parent,
                None => return,
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Lazily yields every group whose box intersects `window`.
    ///
    /// A window with min > max on either axis yields nothing.
    pub fn query(&self, window: &BoundingBox) -> Query<'_> {
        let stack = if window.is_valid() {
            vec![Child::Node(self.root)]
        } else {
            Vec::new()
        };
        Query {
            index: self,
            window: *window,
            stack,
        }
    }

    /// [`query`](Self::query) restricted to groups in `layers`.
    pub fn query_in_layers<'a, S: GroupStore + ?Sized>(
        &'a self,
        window: &BoundingBox,
        layers: LayerMask,
        store: &'a S,
    ) -> impl Iterator<Item = GroupRef> + 'a {
        self.query(window)
            .filter(move |group| store.is_layer_member(*group, layers))
    }

    /// Polygons with a reference box intersecting `window`, with their
    /// boundary members resolved through `store`.
    pub fn query_flate<S: GroupStore + ?Sized>(
        &self,
        window: &BoundingBox,
        layers: LayerMask,
        store: &S,
    ) -> SpatialResult<Vec<FlateHit>> {
        let mut hits = Vec::new();
        for flate in self.query_in_layers(window, layers, store) {
            if !self.has_reference_box(flate) || !store.is_flate(flate) {
                continue;
            }
            let members = store
                .boundary_members(flate)?
                .into_iter()
                .map(|m| m.group)
                .collect();
            hits.push(FlateHit { flate, members });
        }
        Ok(hits)
    }

    // ========================================================================
    // Verification
    // ========================================================================

    /// Verifies the structural invariants and reports the first violation.
    ///
    /// Every node box must equal the union of its children, no node may
    /// exceed the fan-out, only the root may be empty, parent links must
    /// match the child lists, and all leaf-level nodes must share one depth.
    pub fn check_invariants(&self) -> SpatialResult<()> {
        if self.nodes[self.root.0].parent.is_some() {
            return Err(self.violation("root has a parent".to_string()));
        }

        let mut leaf_depth: Option<usize> = None;
        let mut leaf_count = 0;
        let mut stack = vec![(self.root, 1usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id.0];
            if node.children.len() > self.fan_out {
                return Err(self.violation(format!(
                    "node {} has {} children, fan-out is {}",
                    id.0,
                    node.children.len(),
                    self.fan_out
                )));
            }
            if id != self.root && node.children.is_empty() {
                return Err(self.violation(format!("non-root node {} is empty", id.0)));
            }
            if node.bbox != self.children_box(id) {
                return Err(self.violation(format!(
                    "node {} box {} is not the union of its children {}",
                    id.0,
                    node.bbox,
                    self.children_box(id)
                )));
            }

            for child in &node.children {
                match (child, node.leaf_level) {
                    (Child::Leaf(handle), true) => {
                        let slot = &self.leaves[handle.slot];
                        if !slot.live || slot.generation != handle.generation || slot.parent != id {
                            return Err(self.violation(format!(
                                "leaf {} is not linked to node {}",
                                handle, id.0
                            )));
                        }
                        if self.by_group.get(&slot.group) != Some(handle) {
                            return Err(self.violation(format!(
                                "group {} does not map to leaf {}",
                                slot.group, handle
                            )));
                        }
                        leaf_count += 1;
                    }
                    (Child::Node(child_id), false) => {
                        if self.nodes[child_id.0].parent != Some(id) {
                            return Err(self.violation(format!(
                                "node {} does not point back to parent {}",
                                child_id.0, id.0
                            )));
                        }
                        stack.push((*child_id, depth + 1));
                    }
                    _ => {
                        return Err(self.violation(format!(
                            "node {} mixes leaf and node children",
                            id.0
                        )))
                    }
                }
            }

            if node.leaf_level && !node.children.is_empty() {
                match leaf_depth {
                    Some(expected) if expected != depth => {
                        return Err(self.violation(format!(
                            "leaf-level node {} at depth {}, expected {}",
                            id.0, depth, expected
                        )))
                    }
                    _ => leaf_depth = Some(depth),
                }
            }
        }

        if leaf_count != self.by_group.len() {
            return Err(self.violation(format!(
                "{} leaves reachable but {} groups indexed",
                leaf_count,
                self.by_group.len()
            )));
        }
        Ok(())
    }

    fn violation(&self, message: String) -> SpatialError {
        log::error!("R-tree invariant violated: {}", message);
        SpatialError::Invariant(message)
    }
}

/// Lazy depth-first window query over a [`SpatialIndex`].
pub struct Query<'a> {
    index: &'a SpatialIndex,
    window: BoundingBox,
    stack: Vec<Child>,
}

impl Iterator for Query<'_> {
    type Item = GroupRef;

    fn next(&mut self) -> Option<GroupRef> {
        while let Some(child) = self.stack.pop() {
            match child {
                Child::Leaf(handle) => {
                    let leaf = &self.index.leaves[handle.slot];
                    if leaf.bbox.intersects(&self.window) {
                        return Some(leaf.group);
                    }
                }
                Child::Node(id) => {
                    let node = &self.index.nodes[id.0];
                    if node.bbox.intersects(&self.window) {
                        self.stack.extend(node.children.iter().rev().copied());
                    }
                }
            }
        }
        None
    }
}
