/*
 * Grouping engine. Buckets items by the exact display value of the grouping property
 * (case-sensitive, no normalization). Buckets appear in first-seen order and keep the
 * relative order of their items; every input item lands in exactly one bucket.
 * Which properties may be grouped by is decided by the catalog, not here.
 */
use super::models::{GroupNode, TreeNode};
use super::properties::PropertyDef;
use std::collections::HashMap;

pub fn group<T>(items: Vec<T>, property: Option<&PropertyDef<T>>) -> Vec<TreeNode<T>> {
    let Some(property) = property else {
        return items.into_iter().map(TreeNode::Item).collect();
    };

    let mut bucket_index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<GroupNode<T>> = Vec::new();
    for item in items {
        let label = property.value(&item);
        let index = match bucket_index.get(&label) {
            Some(index) => *index,
            None => {
                bucket_index.insert(label.clone(), groups.len());
                groups.push(GroupNode {
                    label,
                    property: property.name.to_string(),
                    children: Vec::new(),
                });
                groups.len() - 1
            }
        };
        groups[index].children.push(TreeNode::Item(item));
    }

    log::trace!(
        "Grouping: Built {} groups by '{}'.",
        groups.len(),
        property.name
    );
    groups.into_iter().map(TreeNode::Group).collect()
}
