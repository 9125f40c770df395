//! Reactive Node Graph
//!
//! Single-context reactive value cells with derived combinators.
//!
//! # Features
//!
//! - **Change Detection**: Observers only hear about values that actually changed
//! - **Replay on Subscribe**: A new observer immediately receives the current value
//! - **Glitch-free Derivation**: Derived nodes are re-evaluated in height order,
//!   never from a half-updated set of inputs
//! - **Cancellation on Switch**: `switch_map` detaches from an abandoned inner
//!   node before attaching to the next one
//! - **Observer Isolation**: A panicking observer is logged and skipped
//!
//! # Quick Start
//!
//! ```rust
//! use node_graph::{combine, Node};
//!
//! let selected: Node<Option<String>> = Node::new();
//! let playing: Node<Option<String>> = Node::new();
//!
//! let is_selected_playing = combine(&selected, &playing, |s, p| s.is_some() && s == p);
//!
//! selected.set(Some("radio".to_string()));
//! playing.set(Some("radio".to_string()));
//! assert_eq!(is_selected_playing.get(), Some(true));
//! ```
//!
//! # Architecture
//!
//! ```text
//! Node<T>  (Rc<NodeCore<T>>)
//!     │
//!     ├── value: Option<T>            unset until the first set
//!     ├── observers: [(id, Fn(&T))]   registration order
//!     ├── dependents: [Weak<node>]    derived nodes below this one
//!     └── compute: Fn() -> Option<T>  derived nodes only
//!
//! set(v) ──► notify observers ──► PropagationQueue (lowest height first)
//!                                   └── recompute ──► notify ──► queue dependents
//! ```

// Modules
pub mod combinators;
pub mod node;
mod propagate;
pub mod subscription;

// Re-exports - Public API
pub use combinators::{coalesce_prefer_first, combine, map, scan, switch_map};
pub use node::{Node, NodeId, ReadNode, WeakNode};
pub use subscription::Subscription;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::combinators::{coalesce_prefer_first, combine, map, scan, switch_map};
    pub use crate::node::{Node, ReadNode};
    pub use crate::subscription::Subscription;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, PartialEq, Debug)]
    struct Source {
        package: &'static str,
        endpoint: Option<&'static str>,
    }

    #[test]
    fn test_full_workflow() {
        let selected: Node<Option<Source>> = Node::new().with_label("selected");
        let endpoint = map(&selected, |s| s.as_ref().and_then(|s| s.endpoint));

        let sessions = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&sessions);
        let session = switch_map(&endpoint, move |endpoint: &Option<&'static str>| {
            log.borrow_mut().push(*endpoint);
            Node::with_value(endpoint.map(|e| format!("session@{}", e)))
        });

        let active: Node<Option<String>> = Node::with_value(None);
        let controller = coalesce_prefer_first(&active, &session);

        selected.set(Some(Source {
            package: "com.example.radio",
            endpoint: Some("radio/.Browse"),
        }));
        assert_eq!(
            controller.get(),
            Some(Some("session@radio/.Browse".to_string()))
        );

        active.set(Some("active-controller".to_string()));
        assert_eq!(controller.get(), Some(Some("active-controller".to_string())));

        selected.set(Some(Source {
            package: "com.example.podcasts",
            endpoint: None,
        }));
        assert_eq!(*sessions.borrow(), vec![Some("radio/.Browse"), None]);
    }

    #[test]
    fn test_node_clone_shares_state() {
        let node1 = Node::new();
        let node2 = node1.clone();

        node1.set(42u32);

        assert_eq!(node2.get(), Some(42));
        assert_eq!(node1.id(), node2.id());
    }

    #[test]
    fn test_heights_follow_derivation_depth() {
        let root = Node::with_value(1u8);
        let one = map(&root, |v| v + 1);
        let two = map(&one, |v| v + 1);
        let joined = combine(&root, &two, |a, b| a + b);

        assert_eq!(root.height(), 0);
        assert_eq!(one.height(), 1);
        assert_eq!(two.height(), 2);
        assert_eq!(joined.height(), 3);
    }
}
