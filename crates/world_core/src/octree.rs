//! Arena-based octree spatial index with precomputed neighbor links.
//!
//! The tree recursively partitions an axis-aligned bounding volume into
//! eight octants and keeps, for every node, links to its six same-depth
//! neighbors so that proximity queries never search. Nodes live in a slot
//! arena addressed by stable [`NodeIndex`] values; "pointer" fields are
//! `Option<NodeIndex>`, so deleting a subtree can never leave a dangling
//! reference - survivors are re-pointed by a recomputation pass instead.
//!
//! ## Octant encoding
//!
//! An octant index is three bits: bit 2 set means the high X half, bit 1 the
//! high Y half, bit 0 the high Z half. Flipping the bit for an axis yields
//! the sibling (or mirrored child) across that axis, which is the core of
//! the neighbor derivation rule.
//!
//! ## Shape changes
//!
//! Neighbor links are only valid after [`Octree::compute_neighbors`] has run
//! over the finished tree; `build` runs it automatically once the full
//! recursive build completes, and [`Octree::destroy_subtree`] reruns it so
//! that nodes which pointed at the destroyed subtree re-resolve to its
//! parent. Leaf-membership mutations (`insert`/`remove`) do not change the
//! tree shape and leave the links untouched.

use crate::error::WorldError;
use crate::types::{Aabb, ActorId, Vec3};
use serde::{Deserialize, Serialize};

/// Stable handle of one node in the octree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(u32);

impl NodeIndex {
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// One of the six axis-aligned neighbor directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    XPos,
    XNeg,
    YPos,
    YNeg,
    ZPos,
    ZNeg,
}

impl Direction {
    /// All six directions in storage order.
    pub const ALL: [Direction; 6] = [
        Direction::XPos,
        Direction::XNeg,
        Direction::YPos,
        Direction::YNeg,
        Direction::ZPos,
        Direction::ZNeg,
    ];

    /// Position of this direction in a node's neighbor array.
    pub fn index(self) -> usize {
        match self {
            Direction::XPos => 0,
            Direction::XNeg => 1,
            Direction::YPos => 2,
            Direction::YNeg => 3,
            Direction::ZPos => 4,
            Direction::ZNeg => 5,
        }
    }

    /// The facing-back direction.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::XPos => Direction::XNeg,
            Direction::XNeg => Direction::XPos,
            Direction::YPos => Direction::YNeg,
            Direction::YNeg => Direction::YPos,
            Direction::ZPos => Direction::ZNeg,
            Direction::ZNeg => Direction::ZPos,
        }
    }

    /// Octant bit of the axis this direction moves along.
    fn axis_bit(self) -> u8 {
        match self {
            Direction::XPos | Direction::XNeg => 0b100,
            Direction::YPos | Direction::YNeg => 0b010,
            Direction::ZPos | Direction::ZNeg => 0b001,
        }
    }

    fn is_positive(self) -> bool {
        matches!(self, Direction::XPos | Direction::YPos | Direction::ZPos)
    }
}

/// Subdivision bounds of the octree.
///
/// The tree always subdivides down to `min_depth`, never past `max_depth`,
/// and between the two a node becomes a leaf once its actor count fits in
/// `max_leaf_objects`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OctreeConfig {
    /// Depth the tree always subdivides to, regardless of occupancy
    pub min_depth: u8,
    /// Depth the tree never subdivides past, regardless of occupancy
    pub max_depth: u8,
    /// Leaf capacity between the two depth bounds
    pub max_leaf_objects: usize,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            min_depth: 1,
            max_depth: 5,
            max_leaf_objects: 8,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    bounds: Aabb,
    depth: u8,
    parent: Option<NodeIndex>,
    children: [Option<NodeIndex>; 8],
    neighbors: [Option<NodeIndex>; 6],
    actors: Vec<ActorId>,
}

impl Node {
    fn new(bounds: Aabb, depth: u8, parent: Option<NodeIndex>) -> Self {
        Self {
            bounds,
            depth,
            parent,
            children: [None; 8],
            neighbors: [None; 6],
            actors: Vec::new(),
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.iter().all(|c| c.is_none())
    }
}

/// Octant index of a point relative to a node's center.
fn octant_of(bounds: Aabb, p: Vec3) -> u8 {
    let c = bounds.center();
    let mut octant = 0u8;
    if p.x >= c.x {
        octant |= 0b100;
    }
    if p.y >= c.y {
        octant |= 0b010;
    }
    if p.z >= c.z {
        octant |= 0b001;
    }
    octant
}

/// Bounds of one octant of a parent box.
fn octant_bounds(bounds: Aabb, octant: u8) -> Aabb {
    let c = bounds.center();
    let (min_x, max_x) = if octant & 0b100 != 0 {
        (c.x, bounds.max.x)
    } else {
        (bounds.min.x, c.x)
    };
    let (min_y, max_y) = if octant & 0b010 != 0 {
        (c.y, bounds.max.y)
    } else {
        (bounds.min.y, c.y)
    };
    let (min_z, max_z) = if octant & 0b001 != 0 {
        (c.z, bounds.max.z)
    } else {
        (bounds.min.z, c.z)
    };
    Aabb::new(Vec3::new(min_x, min_y, min_z), Vec3::new(max_x, max_y, max_z))
}

/// Spatial index over one sector of the world.
#[derive(Debug, Clone)]
pub struct Octree {
    config: OctreeConfig,
    nodes: Vec<Option<Node>>,
    free: Vec<NodeIndex>,
    root: NodeIndex,
}

impl Octree {
    /// Creates an empty tree covering `bounds`.
    pub fn new(bounds: Aabb, config: OctreeConfig) -> Self {
        Self {
            config,
            nodes: vec![Some(Node::new(bounds, 0, None))],
            free: Vec::new(),
            root: NodeIndex(0),
        }
    }

    /// The root node handle.
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Bounds of the whole tree.
    pub fn bounds(&self) -> Aabb {
        self.node(self.root).bounds
    }

    /// Rebuilds the tree from a flat actor list.
    ///
    /// Each actor is classified into one of eight octants by comparing its
    /// position against the node center, recursively. A node becomes a leaf
    /// when `depth == max_depth`, or when `depth >= min_depth` and its actor
    /// count fits the leaf capacity. The neighbor pass runs exactly once,
    /// after the full recursive build has fixed the tree shape - neighbor
    /// derivation for a node depends on its siblings existing.
    pub fn build(&mut self, actors: Vec<(ActorId, Vec3)>) {
        let bounds = self.bounds();
        self.nodes.clear();
        self.free.clear();
        self.nodes.push(Some(Node::new(bounds, 0, None)));
        self.root = NodeIndex(0);
        self.build_node(self.root, actors, 0);
        self.compute_neighbors();
    }

    fn build_node(&mut self, index: NodeIndex, items: Vec<(ActorId, Vec3)>, depth: u8) {
        let leaf = depth >= self.config.max_depth
            || (depth >= self.config.min_depth && items.len() <= self.config.max_leaf_objects);
        if leaf {
            self.node_mut(index).actors = items.into_iter().map(|(id, _)| id).collect();
            return;
        }

        let bounds = self.node(index).bounds;
        let mut buckets: [Vec<(ActorId, Vec3)>; 8] = Default::default();
        for (id, pos) in items {
            buckets[octant_of(bounds, pos) as usize].push((id, pos));
        }
        for (octant, bucket) in buckets.into_iter().enumerate() {
            let child_bounds = octant_bounds(bounds, octant as u8);
            let child = self.alloc(Node::new(child_bounds, depth + 1, Some(index)));
            self.node_mut(index).children[octant] = Some(child);
            self.build_node(child, bucket, depth + 1);
        }
    }

    /// Recomputes every node's six neighbor links from the current shape.
    ///
    /// The root has no neighbors. Every other node derives its links from
    /// its parent's already-known links and its siblings: a move that stays
    /// inside the parent lands on the sibling across that axis; a move that
    /// leaves the parent asks the parent's neighbor in that direction for
    /// its opposite-facing child, falling back to the parent's neighbor
    /// itself when no such child exists (coarser-grained link).
    ///
    /// Must be rerun whenever the tree shape changes; `build` and
    /// [`Octree::destroy_subtree`] do so automatically.
    pub fn compute_neighbors(&mut self) {
        self.node_mut(self.root).neighbors = [None; 6];
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let children = self.node(index).children;
            for (octant, child) in children.iter().enumerate() {
                let Some(child) = *child else { continue };
                let links = self.derive_neighbors(index, octant as u8);
                self.node_mut(child).neighbors = links;
                stack.push(child);
            }
        }
    }

    fn derive_neighbors(&self, parent: NodeIndex, octant: u8) -> [Option<NodeIndex>; 6] {
        let mut links = [None; 6];
        for dir in Direction::ALL {
            let bit = dir.axis_bit();
            let high = octant & bit != 0;
            let mirrored = (octant ^ bit) as usize;
            // Moving positive from a low octant (or negative from a high
            // one) stays inside the parent: the link is the sibling. A
            // missing sibling (destroyed subtree) re-resolves to the parent.
            if dir.is_positive() != high {
                links[dir.index()] = self.node(parent).children[mirrored].or(Some(parent));
            } else {
                links[dir.index()] = match self.node(parent).neighbors[dir.index()] {
                    Some(pn) => self.node(pn).children[mirrored].or(Some(pn)),
                    None => None,
                };
            }
        }
        links
    }

    /// Leaf node whose volume contains `pos`.
    pub fn leaf_for(&self, pos: Vec3) -> NodeIndex {
        let mut current = self.root;
        loop {
            let node = self.node(current);
            let octant = octant_of(node.bounds, pos) as usize;
            match node.children[octant] {
                Some(child) => current = child,
                None => return current,
            }
        }
    }

    /// Registers an actor in the leaf containing `pos` without rebuilding.
    pub fn insert(&mut self, actor: ActorId, pos: Vec3) -> NodeIndex {
        let leaf = self.leaf_for(pos);
        let node = self.node_mut(leaf);
        if !node.actors.contains(&actor) {
            node.actors.push(actor);
        }
        leaf
    }

    /// Unregisters an actor, addressed by its last known position.
    ///
    /// Falls back to a whole-tree scan if the actor is not in the expected
    /// leaf, so a stale position can never leave a duplicate registration.
    pub fn remove(&mut self, actor: ActorId, pos: Vec3) -> bool {
        let leaf = self.leaf_for(pos);
        let node = self.node_mut(leaf);
        if let Some(at) = node.actors.iter().position(|a| *a == actor) {
            node.actors.swap_remove(at);
            return true;
        }
        for slot in &mut self.nodes {
            if let Some(node) = slot {
                if let Some(at) = node.actors.iter().position(|a| *a == actor) {
                    node.actors.swap_remove(at);
                    return true;
                }
            }
        }
        false
    }

    /// Whether this node (not the whole tree) holds no actors.
    pub fn is_empty(&self, node: NodeIndex) -> bool {
        self.node(node).actors.is_empty()
    }

    /// Actors registered directly on a node.
    pub fn actors_at(&self, node: NodeIndex) -> &[ActorId] {
        &self.node(node).actors
    }

    /// Depth of a node (root is 0).
    pub fn depth_of(&self, node: NodeIndex) -> u8 {
        self.node(node).depth
    }

    /// Neighbor links of a node.
    pub fn neighbors(&self, node: NodeIndex) -> [Option<NodeIndex>; 6] {
        self.node(node).neighbors
    }

    /// Parent of a node, `None` for the root.
    pub fn parent_of(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.node(node).parent
    }

    /// Child slots of a node in octant order.
    pub fn children_of(&self, node: NodeIndex) -> [Option<NodeIndex>; 8] {
        self.node(node).children
    }

    /// All actors registered anywhere under `node`, including itself.
    pub fn collect_actors(&self, node: NodeIndex) -> Vec<ActorId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(index) = stack.pop() {
            let node = self.node(index);
            out.extend_from_slice(&node.actors);
            stack.extend(node.children.iter().flatten());
        }
        out
    }

    /// Actors in the leaf containing `pos` plus every actor under that
    /// leaf's six neighbors. This is the "who needs to know about whom"
    /// query; it never mutates the tree.
    pub fn nearby_actors(&self, pos: Vec3) -> Vec<ActorId> {
        let leaf = self.leaf_for(pos);
        let mut out = self.collect_actors(leaf);
        for neighbor in self.node(leaf).neighbors.into_iter().flatten() {
            for actor in self.collect_actors(neighbor) {
                if !out.contains(&actor) {
                    out.push(actor);
                }
            }
        }
        out
    }

    /// Deletes a whole subtree.
    ///
    /// Detaches the subtree from its parent's child slot, migrates any
    /// actors still registered in the destroyed nodes up into the parent,
    /// frees the arena slots, and recomputes neighbor links tree-wide so
    /// that every node which pointed into the subtree re-resolves to the
    /// destroyed node's parent.
    pub fn destroy_subtree(&mut self, target: NodeIndex) -> Result<(), WorldError> {
        if target == self.root {
            return Err(WorldError::RootDestruction);
        }
        let parent = self
            .node(target)
            .parent
            .ok_or(WorldError::RootDestruction)?;

        let mut migrated = Vec::new();
        let mut stack = vec![target];
        while let Some(index) = stack.pop() {
            let node = self.nodes[index.idx()].take().ok_or(WorldError::StaleNode)?;
            migrated.extend(node.actors);
            stack.extend(node.children.iter().flatten());
            self.free.push(index);
        }

        let parent_node = self.node_mut(parent);
        for slot in &mut parent_node.children {
            if *slot == Some(target) {
                *slot = None;
            }
        }
        parent_node.actors.extend(migrated);

        self.compute_neighbors();
        Ok(())
    }

    /// Number of live nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Handles of every live node.
    pub fn node_indices(&self) -> Vec<NodeIndex> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|_| NodeIndex(i as u32)))
            .collect()
    }

    /// Whether a node is a leaf.
    pub fn is_leaf(&self, node: NodeIndex) -> bool {
        self.node(node).is_leaf()
    }

    fn alloc(&mut self, node: Node) -> NodeIndex {
        if let Some(index) = self.free.pop() {
            self.nodes[index.idx()] = Some(node);
            index
        } else {
            self.nodes.push(Some(node));
            NodeIndex((self.nodes.len() - 1) as u32)
        }
    }

    fn node(&self, index: NodeIndex) -> &Node {
        self.nodes[index.idx()].as_ref().expect("stale node index")
    }

    fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        self.nodes[index.idx()].as_mut().expect("stale node index")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_bounds() -> Aabb {
        Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(64.0, 64.0, 64.0))
    }

    fn config() -> OctreeConfig {
        OctreeConfig {
            min_depth: 1,
            max_depth: 4,
            max_leaf_objects: 4,
        }
    }

    /// Tight cluster in one corner plus a scattered remainder, enough to
    /// force uneven subdivision.
    fn sample_actors() -> Vec<(ActorId, Vec3)> {
        let mut actors = Vec::new();
        for i in 0..24u64 {
            let offset = i as f64 * 0.05;
            actors.push((ActorId(i), Vec3::new(1.0 + offset, 1.0 + offset, 1.0 + offset)));
        }
        for i in 24..40u64 {
            let spread = (i - 24) as f64 * 3.7;
            actors.push((ActorId(i), Vec3::new(spread, 63.0 - spread, spread / 2.0)));
        }
        actors
    }

    #[test]
    fn build_respects_depth_bounds() {
        let mut tree = Octree::new(world_bounds(), config());
        tree.build(sample_actors());

        for index in tree.node_indices() {
            let depth = tree.depth_of(index);
            assert!(depth <= 4, "node deeper than max_depth");
            if !tree.is_leaf(index) {
                // An internal node past min_depth only exists because its
                // subtree exceeded the leaf capacity at build time.
                if depth >= 1 {
                    assert!(
                        tree.collect_actors(index).len() > 4,
                        "node at depth {depth} subdivided without exceeding leaf capacity"
                    );
                }
                assert!(depth < 4, "internal node at max_depth");
            }
        }
    }

    #[test]
    fn every_actor_lands_in_exactly_one_leaf() {
        let mut tree = Octree::new(world_bounds(), config());
        let actors = sample_actors();
        tree.build(actors.clone());

        for (id, _) in &actors {
            let registrations: usize = tree
                .node_indices()
                .iter()
                .map(|n| tree.actors_at(*n).iter().filter(|a| *a == id).count())
                .sum();
            assert_eq!(registrations, 1, "{id} registered {registrations} times");
        }
        // Actors only live on leaves after a build.
        for index in tree.node_indices() {
            if !tree.is_leaf(index) {
                assert!(tree.is_empty(index), "internal node holds actors after build");
            }
        }
    }

    #[test]
    fn root_has_no_neighbors() {
        let mut tree = Octree::new(world_bounds(), config());
        tree.build(sample_actors());
        assert_eq!(tree.neighbors(tree.root()), [None; 6]);
    }

    #[test]
    fn same_depth_neighbors_are_symmetric() {
        let mut tree = Octree::new(world_bounds(), config());
        tree.build(sample_actors());

        let mut checked = 0;
        for index in tree.node_indices() {
            let depth = tree.depth_of(index);
            for dir in Direction::ALL {
                let Some(neighbor) = tree.neighbors(index)[dir.index()] else {
                    continue;
                };
                let neighbor_depth = tree.depth_of(neighbor);
                assert!(neighbor_depth <= depth, "neighbor links never point finer");
                if neighbor_depth == depth {
                    assert_eq!(
                        tree.neighbors(neighbor)[dir.opposite().index()],
                        Some(index),
                        "asymmetric same-depth neighbor pair"
                    );
                    checked += 1;
                }
            }
        }
        assert!(checked > 0, "test tree produced no same-depth neighbor pairs");
    }

    #[test]
    fn insert_and_remove_mutate_leaf_membership_only() {
        let mut tree = Octree::new(world_bounds(), config());
        tree.build(sample_actors());
        let shape_before = tree.node_count();

        let pos = Vec3::new(40.0, 40.0, 40.0);
        let roaming = ActorId(999);
        let leaf = tree.insert(roaming, pos);
        assert!(tree.actors_at(leaf).contains(&roaming));
        assert_eq!(tree.node_count(), shape_before);

        assert!(tree.remove(roaming, pos));
        assert!(!tree.actors_at(leaf).contains(&roaming));
        assert!(!tree.remove(roaming, pos), "second remove is a miss");
    }

    #[test]
    fn remove_with_stale_position_still_unregisters() {
        let mut tree = Octree::new(world_bounds(), config());
        tree.build(Vec::new());
        let wanderer = ActorId(7);
        tree.insert(wanderer, Vec3::new(2.0, 2.0, 2.0));
        // Position drifted to the far corner since registration.
        assert!(tree.remove(wanderer, Vec3::new(60.0, 60.0, 60.0)));
        let total: usize = tree
            .node_indices()
            .iter()
            .map(|n| tree.actors_at(*n).len())
            .sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn destroy_subtree_migrates_actors_and_repoints_neighbors() {
        let mut tree = Octree::new(world_bounds(), config());
        tree.build(sample_actors());

        // The dense corner cluster guarantees a subdivided low-corner child.
        let cluster_leaf = tree.leaf_for(Vec3::new(1.0, 1.0, 1.0));
        let mut target = cluster_leaf;
        while let Some(parent) = tree.parent_of(target) {
            if parent == tree.root() {
                break;
            }
            target = parent;
        }
        assert_ne!(target, tree.root());

        let doomed: Vec<NodeIndex> = {
            let mut all = vec![target];
            let mut i = 0;
            while i < all.len() {
                all.extend(tree.children_of(all[i]).into_iter().flatten());
                i += 1;
            }
            all
        };
        let migrating = tree.collect_actors(target);
        assert!(!migrating.is_empty());
        let parent = tree.parent_of(target).unwrap();

        tree.destroy_subtree(target).expect("destroy failed");

        // Actors moved up into the parent rather than being dropped.
        for actor in &migrating {
            assert!(tree.actors_at(parent).contains(actor));
        }
        // No surviving node points into the destroyed subtree.
        for index in tree.node_indices() {
            for link in tree.neighbors(index).into_iter().flatten() {
                assert!(
                    !doomed.contains(&link),
                    "survivor still points at destroyed node"
                );
            }
        }
        // The parent's slot is detached and lookups fall back to it.
        assert_eq!(tree.leaf_for(Vec3::new(1.0, 1.0, 1.0)), parent);
    }

    #[test]
    fn destroying_the_root_is_rejected() {
        let mut tree = Octree::new(world_bounds(), config());
        tree.build(Vec::new());
        assert!(matches!(
            tree.destroy_subtree(tree.root()),
            Err(WorldError::RootDestruction)
        ));
    }

    #[test]
    fn nearby_actors_covers_leaf_and_neighbor_nodes() {
        let mut tree = Octree::new(
            world_bounds(),
            OctreeConfig {
                min_depth: 2,
                max_depth: 2,
                max_leaf_objects: 1,
            },
        );
        // Two actors in adjacent depth-2 leaves along X, one far away.
        let near_a = (ActorId(1), Vec3::new(14.0, 2.0, 2.0));
        let near_b = (ActorId(2), Vec3::new(18.0, 2.0, 2.0));
        let far = (ActorId(3), Vec3::new(62.0, 62.0, 62.0));
        tree.build(vec![near_a, near_b, far]);

        let visible = tree.nearby_actors(near_a.1);
        assert!(visible.contains(&ActorId(1)));
        assert!(visible.contains(&ActorId(2)), "adjacent-leaf actor missed");
        assert!(!visible.contains(&ActorId(3)), "distant actor leaked in");
    }
}
