//! The guard manager tree.
//!
//! Accepted descriptors are compiled into a tree keyed by accessor
//! steps: descriptors whose paths share a prefix share the traversal of
//! that prefix, each value along a path is resolved exactly once per
//! check, and the whole check short-circuits on the first failing leaf
//! or failing access. `check` is the hot path: it allocates only for
//! transient key-sequence comparisons inside individual predicates.

use std::sync::Arc;

use marten_value::{Bindings, Value};

use crate::descriptor::{AccessStep, GuardDescriptor, Root};
use crate::evaluate::{apply_step, eval_leaf};

/// One node of the tree: the leaves whose paths terminate here plus
/// children keyed by the next accessor step.
#[derive(Default, Debug)]
struct Node {
    leaves: Vec<Arc<GuardDescriptor>>,
    children: Vec<(AccessStep, Node)>,
}

impl Node {
    fn child(&mut self, step: &AccessStep) -> &mut Node {
        // Linear scan: fan-out per node is small, and a Vec keeps
        // evaluation order deterministic.
        let index = match self.children.iter().position(|(s, _)| s == step) {
            Some(i) => i,
            None => {
                self.children.push((step.clone(), Node::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[index].1
    }

    fn check(&self, value: &Value, env: &Bindings) -> bool {
        for leaf in &self.leaves {
            if !eval_leaf(leaf, value, env) {
                return false;
            }
        }
        for (step, child) in &self.children {
            let Some(next) = apply_step(value, step) else {
                return false;
            };
            if !child.check(&next, env) {
                return false;
            }
        }
        true
    }

    fn leaf_count(&self) -> usize {
        self.leaves.len()
            + self
                .children
                .iter()
                .map(|(_, child)| child.leaf_count())
                .sum::<usize>()
    }
}

/// Executable form of an accepted guard set.
///
/// Immutable after construction. `check` is the logical AND of every
/// accepted guard's predicate over the given environment.
pub struct GuardManager {
    roots: Vec<(String, Node)>,
    ambient: Vec<Arc<GuardDescriptor>>,
}

impl GuardManager {
    /// Compile a set of accepted descriptors into a tree.
    pub fn build(descriptors: impl IntoIterator<Item = Arc<GuardDescriptor>>) -> Self {
        let mut manager = Self {
            roots: Vec::new(),
            ambient: Vec::new(),
        };
        for descriptor in descriptors {
            manager.insert(descriptor);
        }
        manager
    }

    fn insert(&mut self, descriptor: Arc<GuardDescriptor>) {
        match descriptor.path().root() {
            Root::Ambient => self.ambient.push(descriptor),
            Root::Binding(name) => {
                let index = match self.roots.iter().position(|(n, _)| n == name) {
                    Some(i) => i,
                    None => {
                        self.roots.push((name.clone(), Node::default()));
                        self.roots.len() - 1
                    }
                };
                let mut node = &mut self.roots[index].1;
                for step in descriptor.path().steps() {
                    node = node.child(step);
                }
                node.leaves.push(descriptor);
            }
        }
    }

    /// Evaluate every guard against the environment.
    ///
    /// Returns `true` iff every reached leaf passed. A missing binding or
    /// a failing access along any path is an immediate `false`.
    pub fn check(&self, env: &Bindings) -> bool {
        for leaf in &self.ambient {
            if !eval_leaf(leaf, &Value::None, env) {
                return false;
            }
        }
        for (name, node) in &self.roots {
            let Some(value) = env.get(name) else {
                return false;
            };
            if !node.check(value, env) {
                return false;
            }
        }
        true
    }

    /// Total number of leaf predicates in the tree.
    pub fn leaf_count(&self) -> usize {
        self.ambient.len()
            + self
                .roots
                .iter()
                .map(|(_, node)| node.leaf_count())
                .sum::<usize>()
    }
}

impl std::fmt::Debug for GuardManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardManager")
            .field("roots", &self.roots.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("leaves", &self.leaf_count())
            .finish()
    }
}
