//! Height-ordered change propagation
//!
//! A `set` on a node re-evaluates the derived nodes below it lowest height
//! first. A node is only evaluated once all of its upstream nodes have
//! settled, so no derived node ever reads a half-updated set of inputs.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;

use tracing::trace;

use crate::node::{NodeId, Reactive};

/// Pending derived nodes for one propagation, keyed by (height, id)
#[derive(Default)]
struct PropagationQueue {
    heap: BinaryHeap<Reverse<(u32, NodeId)>>,
    pending: HashMap<NodeId, Rc<dyn Reactive>>,
}

impl PropagationQueue {
    fn push(&mut self, node: Rc<dyn Reactive>) {
        let id = node.id();
        if self.pending.contains_key(&id) {
            return;
        }
        self.heap.push(Reverse((node.height(), id)));
        self.pending.insert(id, node);
    }

    fn pop(&mut self) -> Option<Rc<dyn Reactive>> {
        while let Some(Reverse((height, id))) = self.heap.pop() {
            let current = match self.pending.get(&id) {
                Some(node) => node.height(),
                None => continue,
            };
            // A switch may have raised the node since it was queued.
            if current != height {
                self.heap.push(Reverse((current, id)));
                continue;
            }
            return self.pending.remove(&id);
        }
        None
    }
}

/// Re-evaluate `start` and everything that changes below it
pub(crate) fn propagate(start: Vec<Rc<dyn Reactive>>) {
    if start.is_empty() {
        return;
    }

    let mut queue = PropagationQueue::default();
    for node in start {
        queue.push(node);
    }

    let mut evaluated = 0usize;
    while let Some(node) = queue.pop() {
        evaluated += 1;
        if node.recompute() {
            for dependent in node.dependents() {
                queue.push(dependent);
            }
        }
    }

    trace!(evaluated, "Propagation settled");
}
