use std::cmp::Ordering;

use anyhow::{anyhow, Result};
use phylotree::tree::{Node as PhyloNode, Tree as PhyloTree};

pub mod cladogram;
pub mod detail;
pub mod layout;
pub mod metrics;
pub mod query;
pub mod ranges;
pub mod scale;
pub mod scene;

pub type NodeId = phylotree::tree::NodeId;

/// Read-only view of a rooted tree, as consumed by the layout pipeline.
///
/// Node ids are dense arena indices in `0..node_count()`. Lookups on ids
/// outside that range answer as if the node were an isolated leaf.
pub trait TreeModel {
    fn root(&self) -> Option<NodeId>;
    fn node_count(&self) -> usize;
    fn children(&self, node: NodeId) -> &[NodeId];
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    /// Longest edge count from `node` down to any leaf beneath it.
    fn max_depth(&self, node: NodeId) -> usize;
    fn enclosed_leaf_count(&self, node: NodeId) -> usize;
    fn name(&self, node: NodeId) -> &str;

    fn is_leaf(&self, node: NodeId) -> bool {
        self.children(node).is_empty()
    }

    /// Total order used by the diagonal layout to pick the outermost children.
    fn compare_nodes(&self, a: NodeId, b: NodeId) -> Ordering {
        a.cmp(&b)
    }

    /// Bumped whenever topology or child order changes.
    fn revision(&self) -> u64 {
        0
    }
}

/// Representation of a phylogenetic tree with an explicit node list.
#[derive(Debug, Clone)]
pub struct Tree {
    pub id: usize,
    pub label: Option<String>,
    pub newick: String,
    pub root: Option<NodeId>,
    pub nodes: Vec<TreeNode>,
    revision: u64,
    max_depths: Vec<usize>,
    leaf_counts: Vec<usize>,
    first_leaf_ranks: Vec<usize>,
}

impl Tree {
    pub fn new(id: usize, label: Option<String>, newick: String, phylo: &PhyloTree) -> Self {
        let nodes = (0..phylo.size())
            .map(|idx| match phylo.get(&idx) {
                Ok(node) => TreeNode::from_phylo(node),
                Err(_) => TreeNode::new(idx, None),
            })
            .collect();
        let mut tree = Self::from_nodes(id, label, nodes);
        tree.newick = newick;
        if let Ok(root) = phylo.get_root() {
            tree.root = Some(root);
            tree.refresh_caches();
        }
        tree
    }

    /// Parse a single Newick string.
    pub fn from_newick(newick: &str) -> Result<Self> {
        let phylo = PhyloTree::from_newick(newick)
            .map_err(|err| anyhow!("failed to parse newick tree: {err}"))?;
        Ok(Self::new(0, None, newick.to_string(), &phylo))
    }

    /// Build a tree from nodes whose `parent`/`children` links are already set.
    /// The first parentless node becomes the root. Ids are slice positions;
    /// child links outside the slice and links back into visited nodes are
    /// ignored by every traversal.
    pub fn from_nodes(id: usize, label: Option<String>, nodes: Vec<TreeNode>) -> Self {
        let root = nodes.iter().position(TreeNode::is_root);
        let mut tree = Self {
            id,
            label,
            newick: String::new(),
            root,
            nodes,
            revision: 0,
            max_depths: Vec::new(),
            leaf_counts: Vec::new(),
            first_leaf_ranks: Vec::new(),
        };
        tree.refresh_caches();
        tree
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn leaf_count(&self) -> usize {
        self.root
            .and_then(|root| self.leaf_counts.get(root).copied())
            .unwrap_or(0)
    }

    /// Leaves in top-to-bottom drawing order: depth first, children in stored order.
    pub fn leaves_in_order(&self) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|&id| self.nodes[id].is_leaf())
            .collect()
    }

    /// All reachable nodes, parents before children. Each node appears once.
    pub fn preorder(&self) -> Vec<NodeId> {
        let count = self.nodes.len();
        let mut order = Vec::with_capacity(count);
        let Some(root) = self.root else {
            return order;
        };
        let mut seen = vec![false; count];
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if current >= count || std::mem::replace(&mut seen[current], true) {
                continue;
            }
            order.push(current);
            // Reverse so the first child is visited first.
            stack.extend(self.nodes[current].children.iter().rev().copied());
        }
        order
    }

    /// Sort every node's children by clade size.
    /// If `increasing` is true, smaller clades come first.
    pub fn ladderize(&mut self, increasing: bool) {
        let sizes = self.leaf_counts.clone();
        let size = |id: NodeId| sizes.get(id).copied().unwrap_or(0);
        for node in &mut self.nodes {
            if node.children.len() > 1 {
                node.children.sort_by(|&a, &b| {
                    if increasing {
                        size(a).cmp(&size(b))
                    } else {
                        size(b).cmp(&size(a))
                    }
                });
            }
        }
        self.touch();
    }

    /// Reverse the tip order beneath `node_id`.
    pub fn rotate_node(&mut self, node_id: NodeId) {
        if node_id >= self.nodes.len() {
            return;
        }
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![node_id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current) else {
                continue;
            };
            if std::mem::replace(&mut seen[current], true) {
                continue;
            }
            node.children.reverse();
            stack.extend(node.children.iter().copied());
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.refresh_caches();
    }

    fn refresh_caches(&mut self) {
        let count = self.nodes.len();
        self.max_depths = vec![0; count];
        self.leaf_counts = vec![1; count];
        self.first_leaf_ranks = vec![0; count];

        let order = self.preorder();
        let mut rank = 0usize;
        for &id in &order {
            if self.nodes[id].is_leaf() {
                self.first_leaf_ranks[id] = rank;
                rank += 1;
            }
        }

        for &id in order.iter().rev() {
            let children: Vec<NodeId> = self.nodes[id]
                .children
                .iter()
                .copied()
                .filter(|&c| c < count)
                .collect();
            if children.is_empty() {
                continue;
            }
            let leaves: usize = children.iter().map(|&c| self.leaf_counts[c]).sum();
            let depth = children
                .iter()
                .map(|&c| self.max_depths[c] + 1)
                .max()
                .unwrap_or(0);
            let rank = children
                .iter()
                .map(|&c| self.first_leaf_ranks[c])
                .min()
                .unwrap_or(0);
            self.leaf_counts[id] = leaves;
            self.max_depths[id] = depth;
            self.first_leaf_ranks[id] = rank;
        }
    }
}

impl TreeModel for Tree {
    fn root(&self) -> Option<NodeId> {
        self.root
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    fn max_depth(&self, node: NodeId) -> usize {
        self.max_depths.get(node).copied().unwrap_or(0)
    }

    fn enclosed_leaf_count(&self, node: NodeId) -> usize {
        self.leaf_counts.get(node).copied().unwrap_or(1)
    }

    fn name(&self, node: NodeId) -> &str {
        self.nodes
            .get(node)
            .and_then(|n| n.name.as_deref())
            .unwrap_or("")
    }

    /// Topmost clade first: compares the rank of each node's first leaf.
    fn compare_nodes(&self, a: NodeId, b: NodeId) -> Ordering {
        let rank = |id: NodeId| self.first_leaf_ranks.get(id).copied().unwrap_or(usize::MAX);
        rank(a).cmp(&rank(b)).then(a.cmp(&b))
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

/// Node within a phylogenetic tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub id: NodeId,
    pub name: Option<String>,
    pub length: Option<f64>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl TreeNode {
    pub fn new(id: NodeId, name: Option<String>) -> Self {
        Self {
            id,
            name,
            length: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    fn from_phylo(node: &PhyloNode) -> Self {
        Self {
            id: node.id,
            name: node.name.clone(),
            length: node.parent_edge,
            parent: node.parent,
            children: node.children.clone(),
        }
    }
}

/// Build a tree from `(name, parent)` pairs; ids are the slice positions.
#[cfg(test)]
pub(crate) fn tree_from_parents(entries: &[(&str, Option<NodeId>)]) -> Tree {
    let mut nodes: Vec<TreeNode> = entries
        .iter()
        .enumerate()
        .map(|(id, (name, parent))| {
            let mut node = TreeNode::new(id, (!name.is_empty()).then(|| name.to_string()));
            node.parent = *parent;
            node
        })
        .collect();
    for (id, (_, parent)) in entries.iter().enumerate() {
        if let Some(parent) = parent {
            nodes[*parent].children.push(id);
        }
    }
    Tree::from_nodes(0, None, nodes)
}
