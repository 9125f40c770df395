//! Choosing one controller out of the active list

use node_graph::{scan, Node};

use crate::model::{ControllerHandle, MediaSourceHandle};

/// Stable selection over the list of active controllers
///
/// The list is ordered by precedence: index 0 is the most recently active
/// controller.
pub struct ActiveItemSelector;

impl ActiveItemSelector {
    /// Keep `previous` while it is still in `list`, otherwise take the head
    ///
    /// A reordered list with the same members therefore yields the same
    /// controller.
    pub fn select(
        previous: Option<&ControllerHandle>,
        list: &[ControllerHandle],
    ) -> Option<ControllerHandle> {
        previous
            .and_then(|previous| list.iter().find(|candidate| *candidate == previous))
            .or_else(|| list.first())
            .cloned()
    }

    /// First controller in precedence order belonging to `source`
    pub fn controller_for_source(
        list: &[ControllerHandle],
        source: Option<&MediaSourceHandle>,
    ) -> Option<ControllerHandle> {
        let source = source?;
        list.iter()
            .find(|controller| controller.package_name() == &source.package)
            .cloned()
    }

    /// Node holding the stable selection over `list`
    ///
    /// The previous output is the fold accumulator, so each list update is
    /// judged against what was chosen for the update before it.
    pub fn top_active(list: &Node<Vec<ControllerHandle>>) -> Node<Option<ControllerHandle>> {
        scan(list, None, |previous: &Option<ControllerHandle>, list: &Vec<ControllerHandle>| {
            Self::select(previous.as_ref(), list)
        })
        .with_label("top_active_controller")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::controller;

    #[test]
    fn test_empty_list_selects_nothing() {
        assert_eq!(ActiveItemSelector::select(None, &[]), None);
        let a = controller("a", "com.a");
        assert_eq!(ActiveItemSelector::select(Some(&a), &[]), None);
    }

    #[test]
    fn test_without_previous_takes_head() {
        let a = controller("a", "com.a");
        let b = controller("b", "com.b");
        assert_eq!(ActiveItemSelector::select(None, &[b.clone(), a]), Some(b));
    }

    #[test]
    fn test_reordered_list_keeps_previous() {
        let a = controller("a", "com.a");
        let b = controller("b", "com.b");

        let first = ActiveItemSelector::select(None, &[a.clone(), b.clone()]);
        let second = ActiveItemSelector::select(first.as_ref(), &[b, a.clone()]);

        assert_eq!(second, Some(a));
    }

    #[test]
    fn test_removed_previous_falls_back_to_head() {
        let a = controller("a", "com.a");
        let b = controller("b", "com.b");

        let first = ActiveItemSelector::select(None, &[a.clone()]);
        let second = ActiveItemSelector::select(first.as_ref(), &[b.clone()]);

        assert_eq!(second, Some(b));
    }

    #[test]
    fn test_top_active_is_stable_across_updates() {
        let a = controller("a", "com.a");
        let b = controller("b", "com.b");
        let c = controller("c", "com.c");
        let list = Node::with_value(vec![a.clone(), b.clone()]);
        let top = ActiveItemSelector::top_active(&list);
        assert_eq!(top.get(), Some(Some(a.clone())));

        list.set(vec![b.clone(), a.clone()]);
        assert_eq!(top.get(), Some(Some(a.clone())));

        list.set(vec![b.clone()]);
        assert_eq!(top.get(), Some(Some(b.clone())));

        list.set(vec![c.clone(), b.clone()]);
        assert_eq!(top.get(), Some(Some(b)));

        list.set(Vec::new());
        assert_eq!(top.get(), Some(None));

        list.set(vec![c.clone()]);
        assert_eq!(top.get(), Some(Some(c)));
    }

    #[test]
    fn test_top_active_unset_until_list_is() {
        let list: Node<Vec<ControllerHandle>> = Node::new();
        let top = ActiveItemSelector::top_active(&list);
        assert!(!top.is_set());
    }

    #[test]
    fn test_controller_for_source_matches_package() {
        let a = controller("a", "com.a");
        let b1 = controller("b1", "com.b");
        let b2 = controller("b2", "com.b");
        let list = vec![a, b1.clone(), b2];

        let source = MediaSourceHandle::new("com.b");
        assert_eq!(
            ActiveItemSelector::controller_for_source(&list, Some(&source)),
            Some(b1)
        );
        let missing = MediaSourceHandle::new("com.c");
        assert_eq!(
            ActiveItemSelector::controller_for_source(&list, Some(&missing)),
            None
        );
        assert_eq!(ActiveItemSelector::controller_for_source(&list, None), None);
    }
}
