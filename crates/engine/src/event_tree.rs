//! Branching tree of bound operations.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. A node owns
//! its children through the arena; the parent link is a plain index used for
//! lookups only.

use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::payload::Payload;
use crate::processor::ProcessedOperation;

/// Index of a node in an [`EventTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Node<T> {
    /// `None` is the identity operation of the root.
    operation: Option<ProcessedOperation<T>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Every candidate operation sequence for a unit, as a tree.
///
/// Each root-to-leaf path is one candidate chain of operations.
#[derive(Debug)]
pub struct EventTree<T> {
    nodes: Vec<Node<T>>,
}

impl<T> EventTree<T> {
    /// Create a tree holding only the identity root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                operation: None,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds only its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Attach a new child carrying `operation` under `parent`.
    pub fn add_branch(&mut self, parent: NodeId, operation: ProcessedOperation<T>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            operation: Some(operation),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Operation held by a node. `None` for the root.
    pub fn operation(&self, id: NodeId) -> Option<&ProcessedOperation<T>> {
        self.nodes.get(id.0)?.operation.as_ref()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Parent of a node.
    pub fn previous(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    /// Walk parent links up to the root.
    pub fn find_root(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.previous(current) {
            current = parent;
        }
        current
    }

    /// Nodes without children, in depth-first order.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let children = self.children(id);
            if children.is_empty() {
                leaves.push(id);
            } else {
                stack.extend(children.iter().rev());
            }
        }
        leaves
    }

    /// Every root-to-leaf path as a flat list of operations.
    ///
    /// The identity root is not part of any chain, so a tree holding only
    /// its root yields a single empty chain.
    pub fn operation_chains(&self) -> Vec<Vec<ProcessedOperation<T>>> {
        let mut chains = Vec::new();
        let mut prefix = Vec::new();
        self.collect_chains(self.root(), &mut prefix, &mut chains);
        chains
    }

    /// Depth-first walk keeping the root-to-node path in `prefix`.
    fn collect_chains(
        &self,
        id: NodeId,
        prefix: &mut Vec<ProcessedOperation<T>>,
        chains: &mut Vec<Vec<ProcessedOperation<T>>>,
    ) {
        let operation = self.operation(id);
        if let Some(operation) = operation {
            prefix.push(operation.clone());
        }

        let children = self.children(id);
        if children.is_empty() {
            chains.push(prefix.clone());
        } else {
            for &child in children {
                self.collect_chains(child, prefix, chains);
            }
        }

        if operation.is_some() {
            prefix.pop();
        }
    }
}

impl<T: Clone> EventTree<T> {
    /// Run `payload` through the whole tree.
    ///
    /// Returns one payload per surviving leaf. Fails with a branch abort when
    /// no leaf survives.
    pub fn evaluate(&self, payload: Payload<T>) -> SimResult<Vec<Payload<T>>> {
        self.evaluate_node(self.root(), payload)
    }

    fn evaluate_node(&self, id: NodeId, payload: Payload<T>) -> SimResult<Vec<Payload<T>>> {
        let current = match self.operation(id) {
            Some(operation) => operation.call(payload)?,
            None => payload,
        };

        let (last, rest) = match self.children(id) {
            [] => return Ok(vec![current]),
            [only] => return self.evaluate_node(*only, current),
            [rest @ .., last] => (*last, rest),
        };

        let mut results = Vec::new();
        let mut aborted = 0;
        for &child in rest {
            self.collect_branch(child, current.clone(), &mut results, &mut aborted)?;
        }
        self.collect_branch(last, current, &mut results, &mut aborted)?;

        if results.is_empty() {
            return Err(SimError::aborted(format!("all {aborted} branches failed")));
        }
        Ok(results)
    }

    fn collect_branch(
        &self,
        child: NodeId,
        payload: Payload<T>,
        results: &mut Vec<Payload<T>>,
        aborted: &mut usize,
    ) -> SimResult<()> {
        match self.evaluate_node(child, payload) {
            Ok(payloads) => results.extend(payloads),
            Err(e) if e.is_branch_abort() => {
                debug!(node = child.index(), reason = %e, "Branch pruned");
                *aborted += 1;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

impl<T> Default for EventTree<T> {
    fn default() -> Self {
        Self::new()
    }
}
