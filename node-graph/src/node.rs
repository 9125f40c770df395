//! Reactive value cells
//!
//! This module provides the core storage primitive of the graph:
//! - `Node<T>`: a shared handle to a value cell with an ordered observer list
//! - `WeakNode<T>`: a non-owning handle used to break reference cycles
//! - `ReadNode<T>`: a handle that can read and observe but never set
//!
//! Every node owns its own observers and the weak list of nodes derived
//! from it. There is no global dispatcher: a `set` drives propagation for
//! exactly the part of the graph that hangs below the node being set.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{error, trace};

use crate::propagate::propagate;
use crate::subscription::Subscription;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Type-erased view of a node, used by propagation and linking
pub(crate) trait Reactive {
    fn id(&self) -> NodeId;
    fn label(&self) -> &'static str;
    fn height(&self) -> u32;

    /// Raise this node (and transitively its dependents) to at least `min`
    fn raise_height(&self, min: u32);

    /// Re-evaluate a derived node from its upstream values.
    ///
    /// Returns `true` when dependents have to be re-evaluated.
    fn recompute(&self) -> bool;

    /// Live dependents, pruning the ones that were dropped
    fn dependents(&self) -> Vec<Rc<dyn Reactive>>;
    fn add_dependent(&self, id: NodeId, dependent: Weak<dyn Reactive>);
    fn remove_dependent(&self, id: NodeId);
}

type Observer<T> = Rc<dyn Fn(&T)>;
type Compute<T> = Box<dyn Fn() -> Option<T>>;
pub(crate) type Equality<T> = fn(&T, &T) -> bool;

pub(crate) fn values_equal<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

pub(crate) struct NodeCore<T> {
    id: NodeId,
    label: Cell<&'static str>,
    /// `None` until the node has been set for the first time
    value: RefCell<Option<T>>,
    /// Bumped on every stored change, including a reset to unset
    version: Cell<u64>,
    /// `None` means every `set` counts as a change
    eq: Option<Equality<T>>,
    height: Cell<u32>,
    observers: RefCell<Vec<(u64, Observer<T>)>>,
    next_observer: Cell<u64>,
    dependents: RefCell<Vec<(NodeId, Weak<dyn Reactive>)>>,
    compute: RefCell<Option<Compute<T>>>,
}

impl<T: Clone + 'static> NodeCore<T> {
    fn new(eq: Option<Equality<T>>) -> Self {
        Self {
            id: NodeId::next(),
            label: Cell::new("node"),
            value: RefCell::new(None),
            version: Cell::new(0),
            eq,
            height: Cell::new(0),
            observers: RefCell::new(Vec::new()),
            next_observer: Cell::new(0),
            dependents: RefCell::new(Vec::new()),
            compute: RefCell::new(None),
        }
    }

    /// Store a value, returning whether it counts as a change
    fn store(&self, value: T) -> bool {
        let mut slot = self.value.borrow_mut();
        let changed = match (slot.as_ref(), self.eq) {
            (Some(current), Some(eq)) => !eq(current, &value),
            _ => true,
        };

        if changed {
            *slot = Some(value);
            self.version.set(self.version.get() + 1);
        }
        changed
    }

    /// Drop the value without notifying observers, returning whether one was held
    fn reset(&self) -> bool {
        let had_value = self.value.borrow_mut().take().is_some();
        if had_value {
            self.version.set(self.version.get() + 1);
        }
        had_value
    }

    fn has_observer(&self, id: u64) -> bool {
        self.observers.borrow().iter().any(|(observer_id, _)| *observer_id == id)
    }

    fn remove_observer(&self, id: u64) {
        self.observers.borrow_mut().retain(|(observer_id, _)| *observer_id != id);
    }

    /// Deliver the current value to every observer in registration order
    fn notify(&self) {
        let version = self.version.get();
        let value = match self.value.borrow().clone() {
            Some(value) => value,
            None => return,
        };
        let observers: Vec<(u64, Observer<T>)> = self
            .observers
            .borrow()
            .iter()
            .map(|(id, observer)| (*id, Rc::clone(observer)))
            .collect();

        for (id, observer) in observers {
            if self.version.get() != version {
                // A nested set already delivered a newer value to everyone.
                trace!(node = self.label.get(), "delivery superseded by a newer value");
                break;
            }
            if !self.has_observer(id) {
                continue;
            }
            self.deliver(id, &observer, &value);
        }
    }

    fn deliver(&self, id: u64, observer: &Observer<T>, value: &T) {
        if catch_unwind(AssertUnwindSafe(|| observer(value))).is_err() {
            error!(
                node = self.label.get(),
                observer = id,
                "Observer panicked, continuing delivery to remaining observers"
            );
        }
    }
}

impl<T: Clone + 'static> Reactive for NodeCore<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn label(&self) -> &'static str {
        self.label.get()
    }

    fn height(&self) -> u32 {
        self.height.get()
    }

    fn raise_height(&self, min: u32) {
        if min <= self.height.get() {
            return;
        }
        self.height.set(min);
        for dependent in self.dependents() {
            dependent.raise_height(min + 1);
        }
    }

    fn recompute(&self) -> bool {
        let next = {
            let compute = self.compute.borrow();
            match compute.as_ref() {
                Some(compute) => compute(),
                None => return false,
            }
        };

        match next {
            Some(value) => {
                if self.store(value) {
                    self.notify();
                    true
                } else {
                    false
                }
            }
            None => self.reset(),
        }
    }

    fn dependents(&self) -> Vec<Rc<dyn Reactive>> {
        let mut dependents = self.dependents.borrow_mut();
        dependents.retain(|(_, weak)| weak.strong_count() > 0);
        dependents.iter().filter_map(|(_, weak)| weak.upgrade()).collect()
    }

    fn add_dependent(&self, id: NodeId, dependent: Weak<dyn Reactive>) {
        let mut dependents = self.dependents.borrow_mut();
        if !dependents.iter().any(|(existing, _)| *existing == id) {
            dependents.push((id, dependent));
        }
    }

    fn remove_dependent(&self, id: NodeId) {
        self.dependents.borrow_mut().retain(|(existing, _)| *existing != id);
    }
}

/// Register `downstream` as a dependent of `upstream` and fix up its height
pub(crate) fn link(upstream: &Rc<dyn Reactive>, downstream: &Rc<dyn Reactive>) {
    upstream.add_dependent(downstream.id(), Rc::downgrade(downstream));
    downstream.raise_height(upstream.height() + 1);
}

// ============================================================================
// Node<T>
// ============================================================================

/// A reactive value cell
///
/// Cloning a `Node` yields another handle to the same cell. Nodes are meant
/// to be driven from one execution context and are therefore `!Send`.
///
/// # Example
///
/// ```rust
/// use node_graph::Node;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let volume = Node::new();
/// volume.set(40u8);
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&seen);
/// let _sub = volume.observe(move |v| sink.borrow_mut().push(*v));
///
/// volume.set(40); // unchanged, no notification
/// volume.set(55);
/// assert_eq!(*seen.borrow(), vec![40, 55]);
/// ```
pub struct Node<T> {
    core: Rc<NodeCore<T>>,
}

impl<T> Clone for Node<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Node<T> {
    /// Create an unset node that only notifies on actual changes
    pub fn new() -> Self {
        Self::from_core(NodeCore::new(Some(values_equal::<T>)))
    }

    /// Create a node that already holds `value`
    pub fn with_value(value: T) -> Self {
        let node = Self::new();
        node.core.store(value);
        node
    }
}

impl<T: Clone + 'static> Node<T> {
    /// Create an unset node that notifies on every `set`
    ///
    /// Use this for values that have no meaningful equality.
    pub fn new_forced() -> Self {
        Self::from_core(NodeCore::new(None))
    }

    fn from_core(core: NodeCore<T>) -> Self {
        Self {
            core: Rc::new(core),
        }
    }

    /// Attach a name used in log records
    pub fn with_label(self, label: &'static str) -> Self {
        self.core.label.set(label);
        self
    }

    pub fn label(&self) -> &'static str {
        self.core.label.get()
    }

    pub fn id(&self) -> NodeId {
        self.core.id
    }

    /// Distance from the furthest source node (sources are at 0)
    pub fn height(&self) -> u32 {
        self.core.height.get()
    }

    /// Store a new value
    ///
    /// If the value changed, observers are notified synchronously in
    /// registration order, then derived nodes are re-evaluated.
    pub fn set(&self, value: T) {
        if !self.core.store(value) {
            trace!(node = self.core.label.get(), "Value unchanged, skipping notification");
            return;
        }
        self.core.notify();
        propagate(self.core.dependents());
    }

    /// Current value, or `None` if the node has never been set
    pub fn get(&self) -> Option<T> {
        self.core.value.borrow().clone()
    }

    pub fn is_set(&self) -> bool {
        self.core.value.borrow().is_some()
    }

    /// Register an observer
    ///
    /// The current value is replayed to the observer right away if the node
    /// has been set. The observer stays registered until the returned
    /// `Subscription` is dropped.
    pub fn observe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        let id = self.core.next_observer.get();
        self.core.next_observer.set(id + 1);

        let observer: Observer<T> = Rc::new(observer);
        self.core
            .observers
            .borrow_mut()
            .push((id, Rc::clone(&observer)));

        let current = self.core.value.borrow().clone();
        if let Some(value) = current {
            self.core.deliver(id, &observer, &value);
        }

        let weak = Rc::downgrade(&self.core);
        Subscription::new(move || {
            if let Some(core) = weak.upgrade() {
                core.remove_observer(id);
            }
        })
    }

    pub fn observer_count(&self) -> usize {
        self.core.observers.borrow().len()
    }

    pub fn downgrade(&self) -> WeakNode<T> {
        WeakNode {
            core: Rc::downgrade(&self.core),
        }
    }

    /// Handle to this cell that can be read and observed but not set
    pub fn read_only(&self) -> ReadNode<T> {
        ReadNode { node: self.clone() }
    }

    // ------------------------------------------------------------------------
    // Graph plumbing (crate-internal)
    // ------------------------------------------------------------------------

    /// Bumped on every stored change
    pub(crate) fn version(&self) -> u64 {
        self.core.version.get()
    }

    pub(crate) fn reactive(&self) -> Rc<dyn Reactive> {
        let core: Rc<NodeCore<T>> = Rc::clone(&self.core);
        core
    }

    /// Unset node with no compute function yet
    pub(crate) fn placeholder(eq: Option<Equality<T>>) -> Self {
        Self::from_core(NodeCore::new(eq))
    }

    /// Derived node evaluated from `upstream` through `compute`
    ///
    /// `compute` returns `None` while the node cannot be evaluated (an input
    /// is unset), which leaves or puts the node back in the unset state.
    pub(crate) fn derived<F>(eq: Option<Equality<T>>, upstream: Vec<Rc<dyn Reactive>>, compute: F) -> Self
    where
        F: Fn() -> Option<T> + 'static,
    {
        let node = Self::placeholder(eq);
        node.install(compute);
        for up in &upstream {
            node.depend_on(up);
        }
        node.evaluate();
        node
    }

    pub(crate) fn install<F>(&self, compute: F)
    where
        F: Fn() -> Option<T> + 'static,
    {
        *self.core.compute.borrow_mut() = Some(Box::new(compute));
    }

    pub(crate) fn depend_on(&self, upstream: &Rc<dyn Reactive>) {
        link(upstream, &self.reactive());
    }

    pub(crate) fn detach_from(&self, upstream: &Rc<dyn Reactive>) {
        upstream.remove_dependent(self.core.id);
    }

    pub(crate) fn evaluate(&self) {
        self.core.recompute();
    }
}

impl<T: Clone + PartialEq + 'static> Default for Node<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.core.id)
            .field("label", &self.core.label.get())
            .field("height", &self.core.height.get())
            .field("value", &self.core.value.borrow())
            .finish()
    }
}

/// Non-owning handle to a node
pub struct WeakNode<T> {
    core: Weak<NodeCore<T>>,
}

impl<T> Clone for WeakNode<T> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
        }
    }
}

impl<T> WeakNode<T> {
    pub fn upgrade(&self) -> Option<Node<T>> {
        self.core.upgrade().map(|core| Node { core })
    }
}

// ============================================================================
// ReadNode<T>
// ============================================================================

/// Read-only handle to a node
///
/// Hands out the value and the observer list of a cell whose writes belong
/// to someone else. Anything derived from a `ReadNode` is read-only as well.
///
/// ```rust
/// use node_graph::Node;
///
/// let source = Node::with_value(3u32);
/// let view = source.read_only();
///
/// source.set(4);
/// assert_eq!(view.get(), Some(4));
/// assert_eq!(view.map(|v| v * 10).get(), Some(40));
/// ```
///
/// There is no way to write through it:
///
/// ```compile_fail
/// use node_graph::Node;
///
/// let view = Node::with_value(3u32).read_only();
/// view.set(4);
/// ```
pub struct ReadNode<T> {
    node: Node<T>,
}

impl<T> Clone for ReadNode<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T: Clone + 'static> ReadNode<T> {
    pub fn label(&self) -> &'static str {
        self.node.label()
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    pub fn height(&self) -> u32 {
        self.node.height()
    }

    /// Current value, or `None` if the node has never been set
    pub fn get(&self) -> Option<T> {
        self.node.get()
    }

    pub fn is_set(&self) -> bool {
        self.node.is_set()
    }

    /// Register an observer, replaying the current value if there is one
    pub fn observe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        self.node.observe(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.node.observer_count()
    }

    /// Derive a read-only node by applying `f` to every value
    pub fn map<B, F>(&self, f: F) -> ReadNode<B>
    where
        B: Clone + PartialEq + 'static,
        F: Fn(&T) -> B + 'static,
    {
        self.node.map(f).read_only()
    }
}

impl<T: Clone + 'static> From<Node<T>> for ReadNode<T> {
    fn from(node: Node<T>) -> Self {
        Self { node }
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadNode").field(&self.node).finish()
    }
}
