//! Derived nodes
//!
//! Each combinator returns a new node that is re-evaluated whenever one of
//! its inputs changes. Derived nodes keep their inputs alive; inputs only
//! hold weak references back, so dropping a derived node detaches it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::node::{values_equal, Node};

/// Derive a node by applying `f` to every value of `source`
pub fn map<A, B, F>(source: &Node<A>, f: F) -> Node<B>
where
    A: Clone + 'static,
    B: Clone + PartialEq + 'static,
    F: Fn(&A) -> B + 'static,
{
    let src = source.clone();
    Node::derived(Some(values_equal::<B>), vec![source.reactive()], move || {
        src.get().map(|value| f(&value))
    })
}

/// Derive a node from the latest values of `a` and `b`
///
/// The result stays unset until both inputs have been set at least once.
pub fn combine<A, B, C, F>(a: &Node<A>, b: &Node<B>, f: F) -> Node<C>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + PartialEq + 'static,
    F: Fn(&A, &B) -> C + 'static,
{
    let left = a.clone();
    let right = b.clone();
    Node::derived(
        Some(values_equal::<C>),
        vec![a.reactive(), b.reactive()],
        move || match (left.get(), right.get()) {
            (Some(x), Some(y)) => Some(f(&x, &y)),
            _ => None,
        },
    )
}

/// Emit `primary` when it holds a value, `fallback` otherwise
///
/// An unset input counts as absent. The result is unset until either input
/// has been set.
pub fn coalesce_prefer_first<T>(primary: &Node<Option<T>>, fallback: &Node<Option<T>>) -> Node<Option<T>>
where
    T: Clone + PartialEq + 'static,
{
    let first = primary.clone();
    let second = fallback.clone();
    Node::derived(
        Some(values_equal::<Option<T>>),
        vec![primary.reactive(), fallback.reactive()],
        move || {
            if !first.is_set() && !second.is_set() {
                return None;
            }
            Some(first.get().flatten().or_else(|| second.get().flatten()))
        },
    )
}

/// Fold every value of `source` into an accumulator
///
/// The accumulator starts at `init` and is folded exactly once per change
/// of `source`. The node holds the latest accumulator.
pub fn scan<A, B, F>(source: &Node<A>, init: B, fold: F) -> Node<B>
where
    A: Clone + 'static,
    B: Clone + PartialEq + 'static,
    F: Fn(&B, &A) -> B + 'static,
{
    struct Accumulator<B> {
        value: B,
        folded_version: Option<u64>,
    }

    let src = source.clone();
    let state = RefCell::new(Accumulator {
        value: init,
        folded_version: None,
    });

    Node::derived(Some(values_equal::<B>), vec![source.reactive()], move || {
        let input = src.get()?;
        let version = src.version();
        let mut state = state.borrow_mut();
        if state.folded_version != Some(version) {
            state.value = fold(&state.value, &input);
            state.folded_version = Some(version);
        }
        Some(state.value.clone())
    })
}

/// Follow the node produced by `f` for the latest value of `source`
///
/// Each new value of `source` replaces the inner node. The output is
/// detached from the previous inner node before it is attached to the next
/// one, so nothing the abandoned node does afterwards reaches observers.
/// While the current inner node is unset, so is the output.
pub fn switch_map<A, B, F>(source: &Node<A>, f: F) -> Node<B>
where
    A: Clone + 'static,
    B: Clone + PartialEq + 'static,
    F: Fn(&A) -> Node<B> + 'static,
{
    let output: Node<B> = Node::placeholder(Some(values_equal::<B>));
    let inner: Rc<RefCell<Option<Node<B>>>> = Rc::new(RefCell::new(None));

    // Epoch counter bumped on every switch; the output depends on it so a
    // switch re-evaluates the output even when the new inner is unset.
    let switcher = {
        let src = source.clone();
        let inner = Rc::clone(&inner);
        let weak_output = output.downgrade();
        let last_request: Cell<Option<u64>> = Cell::new(None);
        let epoch = Cell::new(0u64);

        Node::<u64>::derived(Some(values_equal::<u64>), vec![source.reactive()], move || {
            let output = weak_output.upgrade()?;

            let previous = match src.get() {
                Some(request) => {
                    let version = src.version();
                    if last_request.get() == Some(version) {
                        return Some(epoch.get());
                    }
                    last_request.set(Some(version));

                    let previous = inner.borrow_mut().take();
                    if let Some(previous) = &previous {
                        output.detach_from(&previous.reactive());
                    }
                    let next = f(&request);
                    output.depend_on(&next.reactive());
                    *inner.borrow_mut() = Some(next);
                    previous
                }
                None => {
                    last_request.set(None);
                    let previous = inner.borrow_mut().take();
                    if let Some(previous) = &previous {
                        output.detach_from(&previous.reactive());
                    }
                    previous
                }
            };
            drop(previous);

            epoch.set(epoch.get() + 1);
            Some(epoch.get())
        })
    };

    {
        let switcher_handle = switcher.clone();
        let inner = Rc::clone(&inner);
        output.install(move || {
            switcher_handle.get()?;
            let current = inner.borrow().clone();
            current.and_then(|node| node.get())
        });
    }
    output.depend_on(&switcher.reactive());
    output.evaluate();
    output
}

// ============================================================================
// Method sugar
// ============================================================================

impl<T: Clone + 'static> Node<T> {
    /// See [`map`]
    pub fn map<B, F>(&self, f: F) -> Node<B>
    where
        B: Clone + PartialEq + 'static,
        F: Fn(&T) -> B + 'static,
    {
        map(self, f)
    }

    /// See [`switch_map`]
    pub fn switch_map<B, F>(&self, f: F) -> Node<B>
    where
        B: Clone + PartialEq + 'static,
        F: Fn(&T) -> Node<B> + 'static,
    {
        switch_map(self, f)
    }

    /// See [`scan`]
    pub fn scan<B, F>(&self, init: B, fold: F) -> Node<B>
    where
        B: Clone + PartialEq + 'static,
        F: Fn(&B, &T) -> B + 'static,
    {
        scan(self, init, fold)
    }
}
