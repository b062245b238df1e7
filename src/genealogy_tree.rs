//! The genealogy tree: leaf, coalescence and migration nodes linked by
//! parent/child edges, plus their back-links to [`crate::pop_interval`]
//! records.
//!
//! Grounded on `examples/original_source/src/TreeNode.h` (the `LeafNode`/
//! `CoalNode`/`MigNode` class hierarchy, collapsed here into one tagged enum
//! since the variant set is closed and no further subclassing occurs) and
//! `examples/original_source/src/LocusEmbeddedGenealogy.cpp`'s
//! `constructBranches`/`addMigNode`.

use crate::ids::{IntervalId, NodeId, PopulationId};

/// A single node in a locus's genealogy.
#[derive(Debug, Clone)]
pub enum TreeNode {
    /// A sampled lineage at the present (or at its sample age, for ancient
    /// samples).
    Leaf {
        pop: PopulationId,
        age: f64,
        parent: Option<NodeId>,
        samples_start: Option<IntervalId>,
    },
    /// A coalescence between two lineages.
    Coal {
        pop: PopulationId,
        age: f64,
        parent: Option<NodeId>,
        left: NodeId,
        right: NodeId,
        coal_interval: Option<IntervalId>,
    },
    /// A migration event splitting a branch; `pop` is the population the
    /// lineage is in immediately above this node (i.e. `target`).
    Mig {
        source: PopulationId,
        target: PopulationId,
        age: f64,
        parent: Option<NodeId>,
        child: NodeId,
        mig_band: crate::ids::MigBandId,
        out_mig_interval: Option<IntervalId>,
        in_mig_interval: Option<IntervalId>,
    },
}

impl TreeNode {
    pub fn age(&self) -> f64 {
        match self {
            TreeNode::Leaf { age, .. } => *age,
            TreeNode::Coal { age, .. } => *age,
            TreeNode::Mig { age, .. } => *age,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            TreeNode::Leaf { parent, .. } => *parent,
            TreeNode::Coal { parent, .. } => *parent,
            TreeNode::Mig { parent, .. } => *parent,
        }
    }

    fn set_parent(&mut self, new_parent: Option<NodeId>) {
        match self {
            TreeNode::Leaf { parent, .. } => *parent = new_parent,
            TreeNode::Coal { parent, .. } => *parent = new_parent,
            TreeNode::Mig { parent, .. } => *parent = new_parent,
        }
    }

    /// The population the lineage occupies immediately above this node.
    pub fn pop(&self) -> PopulationId {
        match self {
            TreeNode::Leaf { pop, .. } => *pop,
            TreeNode::Coal { pop, .. } => *pop,
            TreeNode::Mig { target, .. } => *target,
        }
    }

    pub fn type_str(&self) -> &'static str {
        match self {
            TreeNode::Leaf { .. } => "leaf",
            TreeNode::Coal { .. } => "coal",
            TreeNode::Mig { .. } => "mig",
        }
    }

    /// Children of this node, in a fixed order. Leaves have none, coalescence
    /// nodes have two, migration nodes have one.
    pub fn children(&self) -> [Option<NodeId>; 2] {
        match self {
            TreeNode::Leaf { .. } => [None, None],
            TreeNode::Coal { left, right, .. } => [Some(*left), Some(*right)],
            TreeNode::Mig { child, .. } => [Some(*child), None],
        }
    }
}

/// Arena of tree nodes for one locus's genealogy.
///
/// Mirrors the original's flat `nodeArray_` of polymorphic `TreeNode*`
/// entries: `Vec<TreeNode>` indexed by [`NodeId`], grown and cleared in
/// place across MCMC steps (per the spec's arena-with-indices redesign).
#[derive(Debug, Clone, Default)]
pub struct GenealogyTree {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
}

impl GenealogyTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all nodes, retaining arena capacity (mirrors the original's
    /// `reset()`, which reuses its fixed-size array without reallocating).
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.index()]
    }

    pub fn node_pop(&self, id: NodeId) -> PopulationId {
        self.node(id).pop()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    fn push(&mut self, node: TreeNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Adds a leaf node for a sampled lineage.
    pub fn add_leaf(&mut self, pop: PopulationId, age: f64) -> NodeId {
        self.push(TreeNode::Leaf {
            pop,
            age,
            parent: None,
            samples_start: None,
        })
    }

    /// Adds a coalescence node joining `left` and `right`, and wires their
    /// parent links.
    pub fn add_coal(&mut self, pop: PopulationId, age: f64, left: NodeId, right: NodeId) -> NodeId {
        let id = self.push(TreeNode::Coal {
            pop,
            age,
            parent: None,
            left,
            right,
            coal_interval: None,
        });
        self.node_mut(left).set_parent(Some(id));
        self.node_mut(right).set_parent(Some(id));
        id
    }

    /// Splices a migration node into the branch above `child`, taking over
    /// `child`'s old parent link. Mirrors `addMigNode` in the original:
    /// a lineage crossing a migration band boundary gets a new node inserted
    /// mid-branch rather than at a coalescence.
    pub fn add_mig(
        &mut self,
        child: NodeId,
        source: PopulationId,
        target: PopulationId,
        age: f64,
        mig_band: crate::ids::MigBandId,
    ) -> NodeId {
        let old_parent = self.node(child).parent();
        let id = self.push(TreeNode::Mig {
            source,
            target,
            age,
            parent: old_parent,
            child,
            mig_band,
            out_mig_interval: None,
            in_mig_interval: None,
        });
        self.node_mut(child).set_parent(Some(id));
        if let Some(parent) = old_parent {
            match self.node_mut(parent) {
                TreeNode::Coal { left, right, .. } => {
                    if *left == child {
                        *left = id;
                    } else if *right == child {
                        *right = id;
                    }
                }
                TreeNode::Mig { child: c, .. } => {
                    if *c == child {
                        *c = id;
                    }
                }
                TreeNode::Leaf { .. } => {
                    unreachable!("leaf nodes have no children to retarget")
                }
            }
        } else {
            if let Some(pos) = self.roots.iter().position(|&r| r == child) {
                self.roots[pos] = id;
            }
        }
        id
    }

    /// Registers `node` as a genealogy root (a coalescence with no parent).
    pub fn add_root(&mut self, node: NodeId) {
        self.roots.push(node);
    }

    /// Walks from `leaf` to the root, yielding every node on the branch in
    /// order from leaf to root (inclusive of both).
    pub fn path_to_root(&self, mut node: NodeId) -> Vec<NodeId> {
        let mut path = vec![node];
        while let Some(parent) = self.node(node).parent() {
            path.push(parent);
            node = parent;
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalescence_wires_parent_links() {
        let mut tree = GenealogyTree::new();
        let a = tree.add_leaf(PopulationId(0), 0.0);
        let b = tree.add_leaf(PopulationId(0), 0.0);
        let c = tree.add_coal(PopulationId(0), 1.0, a, b);
        tree.add_root(c);

        assert_eq!(tree.node(a).parent(), Some(c));
        assert_eq!(tree.node(b).parent(), Some(c));
        assert_eq!(tree.node(c).parent(), None);
        assert_eq!(tree.roots(), &[c]);
    }

    #[test]
    fn migration_splices_into_branch() {
        let mut tree = GenealogyTree::new();
        let a = tree.add_leaf(PopulationId(0), 0.0);
        let b = tree.add_leaf(PopulationId(1), 0.0);
        let mig = tree.add_mig(
            a,
            PopulationId(0),
            PopulationId(2),
            0.5,
            crate::ids::MigBandId(0),
        );
        let coal = tree.add_coal(PopulationId(2), 1.0, mig, b);
        tree.add_root(coal);

        assert_eq!(tree.node(mig).parent(), Some(coal));
        match tree.node(coal) {
            TreeNode::Coal { left, .. } => assert_eq!(*left, mig),
            _ => panic!("expected coal node"),
        }
        assert_eq!(tree.path_to_root(a), vec![a, mig, coal]);
    }
}
