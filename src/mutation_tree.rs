//! The forest of mutation-scope trees and the incompatibility relation
//! derived from it.
//!
//! The tree is represented with two flat arrays indexed by pre-order node
//! id (`own_mutations`, `children`) plus a `parent` array of the same
//! length, rather than a heap-pointer graph of boxed nodes — cheap to
//! build in one pass and cheap to walk without recursion.

use std::collections::HashSet;

use crate::error::DriverError;
use crate::model::{MutationId, NodeId};
use crate::mutation_info::NodeDesc;

#[derive(Debug)]
pub struct MutationTree {
    own_mutations: Vec<Vec<MutationId>>,
    children: Vec<Vec<NodeId>>,
    parent: Vec<Option<NodeId>>,
    mutation_id_to_node_id: Vec<NodeId>,
    num_mutations: usize,
}

impl MutationTree {
    /// Builds the forest from one [`NodeDesc`] root per source file via a
    /// single pre-order traversal per file.
    pub fn build(roots: &[NodeDesc]) -> Result<Self, DriverError> {
        let mut tree = MutationTree {
            own_mutations: Vec::new(),
            children: Vec::new(),
            parent: Vec::new(),
            mutation_id_to_node_id: Vec::new(),
            num_mutations: 0,
        };

        for root in roots {
            let root_id = tree.alloc_node(None);
            tree.populate(root, root_id);
        }

        Ok(tree)
    }

    fn alloc_node(&mut self, parent: Option<NodeId>) -> NodeId {
        let id = self.own_mutations.len();
        self.own_mutations.push(Vec::new());
        self.children.push(Vec::new());
        self.parent.push(parent);
        id
    }

    fn populate(&mut self, desc: &NodeDesc, node_id: NodeId) {
        let mut child_ids = Vec::with_capacity(desc.children.len());
        for child_desc in &desc.children {
            let child_id = self.alloc_node(Some(node_id));
            child_ids.push(child_id);
            self.populate(child_desc, child_id);
        }
        self.children[node_id] = child_ids;
        self.own_mutations[node_id] = desc.own_mutation_ids.clone();

        for &mutation_id in &desc.own_mutation_ids {
            let idx = mutation_id as usize;
            if self.mutation_id_to_node_id.len() <= idx {
                self.mutation_id_to_node_id.resize(idx + 1, usize::MAX);
            }
            self.mutation_id_to_node_id[idx] = node_id;
            self.num_mutations = self.num_mutations.max(idx + 1);
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.own_mutations.len()
    }

    pub fn num_mutations(&self) -> usize {
        self.num_mutations
    }

    pub fn parent_map(&self) -> &[Option<NodeId>] {
        &self.parent
    }

    /// Compares two trees structurally: same node count, mutation count,
    /// parent relation, and mutation-id-to-node mapping. Used to assert the
    /// ordinary and coverage-tracking mutation info documents describe the
    /// same mutation tree.
    pub fn structurally_equal(&self, other: &MutationTree) -> bool {
        self.num_nodes() == other.num_nodes()
            && self.num_mutations() == other.num_mutations()
            && self.parent == other.parent
            && self.mutation_id_to_node_id == other.mutation_id_to_node_id
    }

    fn node_of(&self, mutation_id: MutationId) -> Result<NodeId, DriverError> {
        self.mutation_id_to_node_id
            .get(mutation_id as usize)
            .copied()
            .filter(|&n| n != usize::MAX)
            .ok_or(DriverError::InvalidMutationId(mutation_id, self.num_mutations))
    }

    /// The own mutations of `node` plus, recursively, the subtree mutations
    /// of every child. Accumulates into an iterative stack rather than
    /// recursing, so deep trees (syntax nesting can easily run hundreds of
    /// levels) don't blow the call stack.
    pub fn subtree_mutations(&self, node: NodeId) -> HashSet<MutationId> {
        let mut result = HashSet::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            result.extend(self.own_mutations[n].iter().copied());
            stack.extend(self.children[n].iter().copied());
        }
        result
    }

    /// `subtree_mutations(node_of(m)) ∪ {own mutations of each ancestor of
    /// node_of(m)}`. Includes `m` itself, since a mutation is always
    /// incompatible with itself.
    pub fn incompatible(&self, mutation_id: MutationId) -> Result<HashSet<MutationId>, DriverError> {
        let node = self.node_of(mutation_id)?;
        let mut result = self.subtree_mutations(node);
        let mut cur = node;
        while let Some(parent) = self.parent[cur] {
            result.extend(self.own_mutations[parent].iter().copied());
            cur = parent;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::mutation_info::NodeDesc;
    use proptest::prelude::*;

    /// Builds a single-chain tree (root -> child -> child -> ...) where
    /// `group_sizes[i]` mutations are freshly minted for the i-th node, in
    /// order, so ids come out dense and contiguous by construction.
    fn chain_tree(group_sizes: &[usize]) -> MutationTree {
        let mut next_id: MutationId = 0;
        let mut descs: Vec<NodeDesc> = Vec::new();
        for &size in group_sizes.iter().rev() {
            let ids: Vec<MutationId> = (next_id..next_id + size as MutationId).collect();
            next_id += size as MutationId;
            descs = vec![NodeDesc {
                own_mutation_ids: ids,
                children: descs,
            }];
        }
        MutationTree::build(&descs).unwrap()
    }

    proptest! {
        /// Self-containment, symmetry, and dense id ranges hold for
        /// arbitrary chain shapes and group sizes, not just the
        /// hand-picked trees in the unit tests below.
        #[test]
        fn properties_hold_for_arbitrary_chains(group_sizes in prop::collection::vec(0usize..5, 1..8)) {
            let tree = chain_tree(&group_sizes);
            let n = tree.num_mutations() as MutationId;

            for id in 0..n {
                let inc = tree.incompatible(id).unwrap();
                prop_assert!(inc.contains(&id));
                for other in 0..n {
                    let other_inc = tree.incompatible(other).unwrap();
                    prop_assert_eq!(inc.contains(&other), other_inc.contains(&id));
                }
            }
        }
    }
}
