//! The flame tree: a prefix tree over folded stacks where each node's
//! inclusive count is the number of samples whose stack passes through it.
//!
//! Nodes live in an index arena; parent links are `Option<NodeId>` so the
//! back-reference needs no shared ownership, and dropping the arena frees
//! the whole tree without any traversal. Flame trees are shallow but very
//! wide, so every walk here uses an explicit stack rather than recursion.

use fnv::FnvHashMap;

use crate::fold::Folded;
use crate::parse::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

pub const ROOT: NodeId = NodeId(0);

#[derive(Debug)]
pub struct FlameNode<'a> {
    /// `None` only at the synthetic root.
    pub frame: Option<Frame<'a>>,
    /// Samples whose stack ends exactly here.
    pub self_count: usize,
    /// `self_count` plus the inclusive counts of all children.
    pub total_count: usize,
    /// 1 for leaves, 1 + max child height otherwise.
    pub height: usize,
    parent: Option<NodeId>,
    children: FnvHashMap<Frame<'a>, NodeId>,
}

impl<'a> FlameNode<'a> {
    fn new(frame: Option<Frame<'a>>, parent: Option<NodeId>) -> Self {
        FlameNode {
            frame,
            self_count: 0,
            total_count: 0,
            height: 1,
            parent,
            children: FnvHashMap::default(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

#[derive(Debug)]
pub struct FlameTree<'a> {
    nodes: Vec<FlameNode<'a>>,
}

/// Shape summary of a built tree, for logs and sanity checks.
#[derive(Debug, Default, PartialEq)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub leaf_nodes: usize,
    pub max_depth: usize,
    pub total_samples: usize,
    /// Node count per depth, root at index 0.
    pub depth_distribution: Vec<usize>,
}

impl<'a> FlameTree<'a> {
    /// Materialise the folded multiset. Insertion walks or creates children
    /// root→leaf, then bumps `self_count` at the leaf and propagates the
    /// same increment up every ancestor's `total_count`; heights are fixed
    /// up on the way back to the root when a new child deepens a subtree.
    /// Those two upward walks are the only mutators, so counts and heights
    /// are consistent without a second pass.
    pub fn from_folded(folded: &Folded<'a>) -> FlameTree<'a> {
        let mut tree = FlameTree {
            nodes: vec![FlameNode::new(None, None)],
        };
        for (key, &count) in folded.iter() {
            let mut current = ROOT;
            for &frame in key.frames() {
                current = tree.get_or_create_child(current, frame);
            }
            tree.increment_self_count(current, count);
        }
        tree
    }

    pub fn node(&self, id: NodeId) -> &FlameNode<'a> {
        &self.nodes[id.0]
    }

    pub fn root(&self) -> &FlameNode<'a> {
        &self.nodes[ROOT.0]
    }

    /// Number of frame levels below the synthetic root; one less than the
    /// root's cached height, and the deepest `depth` any node reports.
    pub fn depth(&self) -> usize {
        self.root().height - 1
    }

    /// Children in frame order (lexicographic name, then kind), so layout
    /// and export are deterministic for identical multisets.
    pub fn children_in_frame_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut children: Vec<NodeId> = self.nodes[id.0].children.values().copied().collect();
        children.sort_by(|a, b| self.nodes[a.0].frame.cmp(&self.nodes[b.0].frame));
        children
    }

    /// Inclusive count relative to the parent, clamped to 1.0; an
    /// analytical accessor, distinct from the depth-based colour heat.
    pub fn heat_ratio(&self, id: NodeId) -> f64 {
        let node = &self.nodes[id.0];
        let parent = match node.parent {
            Some(p) => &self.nodes[p.0],
            None => return 0.0,
        };
        if parent.total_count == 0 {
            return 0.0;
        }
        (node.total_count as f64 / parent.total_count as f64).min(1.0)
    }

    fn get_or_create_child(&mut self, parent: NodeId, frame: Frame<'a>) -> NodeId {
        if let Some(&existing) = self.nodes[parent.0].children.get(&frame) {
            return existing;
        }
        let child = NodeId(self.nodes.len());
        self.nodes.push(FlameNode::new(Some(frame), Some(parent)));
        self.nodes[parent.0].children.insert(frame, child);
        self.update_height_upward(parent, 2);
        child
    }

    // Walk toward the root while the update is strict; ancestors that are
    // already tall enough end the walk.
    fn update_height_upward(&mut self, from: NodeId, mut expected: usize) {
        let mut current = Some(from);
        while let Some(id) = current {
            let node = &mut self.nodes[id.0];
            if expected <= node.height {
                break;
            }
            node.height = expected;
            expected = node.height + 1;
            current = node.parent;
        }
    }

    fn increment_self_count(&mut self, leaf: NodeId, count: usize) {
        self.nodes[leaf.0].self_count += count;
        let mut current = Some(leaf);
        while let Some(id) = current {
            self.nodes[id.0].total_count += count;
            current = self.nodes[id.0].parent;
        }
    }

    /// Remove every child whose inclusive count falls below `threshold` as a
    /// ratio of its parent's, recursively. Ancestor totals are left as they
    /// were; pruning changes what is drawn, not what was measured.
    pub fn prune(&mut self, threshold: f64) {
        if threshold <= 0.0 {
            return;
        }
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            let total = self.nodes[id.0].total_count;
            if total == 0 {
                continue;
            }
            let doomed: Vec<Frame> = self.nodes[id.0]
                .children
                .iter()
                .filter(|(_, child)| {
                    (self.nodes[child.0].total_count as f64 / total as f64) < threshold
                })
                .map(|(&frame, _)| frame)
                .collect();
            for frame in doomed {
                self.nodes[id.0].children.remove(&frame);
            }
            stack.extend(self.nodes[id.0].children.values().copied());
        }
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        let mut stack = vec![(ROOT, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id.0];
            stats.total_nodes += 1;
            stats.total_samples += node.self_count;
            stats.max_depth = stats.max_depth.max(depth);
            if stats.depth_distribution.len() <= depth {
                stats.depth_distribution.resize(depth + 1, 0);
            }
            stats.depth_distribution[depth] += 1;
            if node.is_leaf() {
                stats.leaf_nodes += 1;
            } else {
                stack.extend(node.children.values().map(|&c| (c, depth + 1)));
            }
        }
        stats
    }
}
