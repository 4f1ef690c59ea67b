//! Dependency graph primitives and the mark phase.
//!
//! Nodes live in the factory's arena and are referred to by [`NodeId`]
//! everywhere. The mark phase computes the transitive closure of reachable
//! nodes from a set of roots; the `marked` flag is monotonic, so the phase
//! terminates even though expanding a method node may create brand-new
//! nodes mid-flight (grown discovery).

use std::collections::VecDeque;
use std::fmt;

/// Index of a node in the factory's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> NodeId {
        NodeId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// One edge of the graph, with the reason it exists.
#[derive(Clone, Copy, Debug)]
pub struct Dependency {
    pub target: NodeId,
    pub reason: &'static str,
}

/// Dependencies of a single node, in discovery order.
#[derive(Debug, Default)]
pub struct DependencyList {
    edges: Vec<Dependency>,
}

impl DependencyList {
    pub fn new() -> DependencyList {
        DependencyList::default()
    }

    pub fn push(&mut self, target: NodeId, reason: &'static str) {
        self.edges.push(Dependency { target, reason });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.edges.iter()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// What the mark phase walks over.
///
/// `expand` may create new nodes (imports, thunks, signatures, other
/// methods); the phase keeps draining until no unmarked node remains.
pub trait MarkSource {
    type Error;

    /// Set the node's marked flag; `false` when it was already set.
    fn try_mark(&mut self, node: NodeId) -> bool;

    /// Compute the node's dependencies.
    fn expand(&mut self, node: NodeId, deps: &mut DependencyList) -> Result<(), Self::Error>;

    /// Optional priority key; pending nodes with lower keys drain first.
    /// `None` everywhere means first-in-first-out.
    fn priority(&self, _node: NodeId) -> Option<u64> {
        None
    }
}

/// Outcome of a mark phase: every marked node in marking order, plus the
/// roots it started from.
#[derive(Debug)]
pub struct MarkSummary {
    pub order: Vec<NodeId>,
    pub roots: Vec<(NodeId, &'static str)>,
}

impl MarkSummary {
    pub fn contains(&self, node: NodeId) -> bool {
        self.order.contains(&node)
    }
}

/// Mark everything reachable from `roots`.
pub fn mark_reachable<S: MarkSource>(
    source: &mut S,
    roots: &[(NodeId, &'static str)],
) -> Result<MarkSummary, S::Error> {
    let mut pending = VecDeque::new();
    let mut order = Vec::new();
    for &(root, _) in roots {
        if source.try_mark(root) {
            pending.push_back(root);
            order.push(root);
        }
    }

    let mut deps = DependencyList::new();
    while let Some(node) = pop_next(source, &mut pending) {
        deps.edges.clear();
        source.expand(node, &mut deps)?;
        for dep in deps.iter() {
            if source.try_mark(dep.target) {
                pending.push_back(dep.target);
                order.push(dep.target);
            }
        }
    }

    Ok(MarkSummary {
        order,
        roots: roots.to_vec(),
    })
}

/// Pop the next pending node: the lowest-keyed one when the source supplies
/// priorities, the oldest one otherwise.
fn pop_next<S: MarkSource>(source: &S, pending: &mut VecDeque<NodeId>) -> Option<NodeId> {
    if pending.is_empty() {
        return None;
    }
    let mut best = 0;
    let mut best_key = 0;
    let mut keyed = false;
    for (position, &node) in pending.iter().enumerate() {
        let Some(key) = source.priority(node) else {
            continue;
        };
        if !keyed || key < best_key {
            keyed = true;
            best_key = key;
            best = position;
        }
    }
    if keyed { pending.remove(best) } else { pending.pop_front() }
}
