/*
 * Sort engine. Orders items by a resolved property and direction using a stable sort;
 * items with equal keys keep their input order in both directions, and no secondary
 * key is ever invented. Within a grouped tree, items are sorted inside every group
 * while the groups themselves keep the grouping engine's first-seen order.
 */
use super::models::TreeNode;
use super::properties::{PropertyDef, SortKey};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Stable sort of arbitrary nodes by a caller-provided key.
pub fn sort_by_key<N>(nodes: &mut [N], key: impl Fn(&N) -> SortKey, direction: SortDirection) {
    // Keys are computed once; formatting a property can be comparatively expensive.
    let mut keyed: Vec<(SortKey, usize)> = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (key(node), index))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| direction.apply(a.cmp(b)));

    let order: Vec<usize> = keyed.into_iter().map(|(_, index)| index).collect();
    apply_permutation(nodes, order);
}

pub fn sort_items<T>(items: &mut [T], property: &PropertyDef<T>, direction: SortDirection) {
    sort_by_key(items, |item| property.sort_key(item), direction);
}

/*
 * Sorts the items of every level of a grouped tree. Levels that hold groups are
 * left in place; only their children are visited.
 */
pub fn sort_nodes<T>(nodes: &mut [TreeNode<T>], property: &PropertyDef<T>, direction: SortDirection) {
    for node in nodes.iter_mut() {
        if let TreeNode::Group(group) = node {
            sort_nodes(&mut group.children, property, direction);
        }
    }
    sort_by_key(
        nodes,
        |node| match node {
            TreeNode::Item(item) => property.sort_key(item),
            // Equal keys under a stable sort: groups keep first-seen order.
            TreeNode::Group(_) => SortKey::Missing,
        },
        direction,
    );
}

// Reorders `nodes` so that position i receives the element previously at `order[i]`.
fn apply_permutation<N>(nodes: &mut [N], mut order: Vec<usize>) {
    for start in 0..order.len() {
        let mut current = start;
        while order[current] != start {
            let next = order[current];
            nodes.swap(current, next);
            order[current] = current;
            current = next;
        }
        order[current] = current;
    }
}
