use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::node::MergeNode;

/// Logical path -> node map of one view. At most one node per path.
#[derive(Debug, Default)]
pub struct NodeCache {
    nodes: Mutex<HashMap<String, Arc<MergeNode>>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Arc<MergeNode>> {
        self.nodes.lock().get(path).cloned()
    }

    /// Insert `node` unless its path is already taken.
    ///  Returns the cached node and whether it was the one just inserted.
    pub fn get_or_insert(&self, node: Arc<MergeNode>) -> (Arc<MergeNode>, bool) {
        let mut nodes = self.nodes.lock();
        if let Some(existing) = nodes.get(node.path()) {
            return (existing.clone(), false);
        }
        nodes.insert(node.path().to_string(), node.clone());
        (node, true)
    }

    /// Remove `node`, but only if it is still the cached node for its path
    pub fn remove_node(&self, node: &Arc<MergeNode>) -> bool {
        let mut nodes = self.nodes.lock();
        match nodes.get(node.path()) {
            Some(cached) if Arc::ptr_eq(cached, node) => {
                nodes.remove(node.path());
                true
            }
            _ => false,
        }
    }

    /// Remove every node strictly below `path`
    pub fn remove_descendants(&self, path: &str) -> Vec<Arc<MergeNode>> {
        let mut nodes = self.nodes.lock();
        let prefix = format!("{}/", path);
        let doomed: Vec<String> = nodes
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        doomed.iter().filter_map(|k| nodes.remove(k)).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.nodes.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::merge::codec;
    use crate::merge::node::NodeLayer;

    fn child(parent: &Arc<MergeNode>, name: &str, ino: u64) -> Arc<MergeNode> {
        MergeNode::child(parent, name, &codec::decode(name), NodeLayer::Normal, ino)
    }

    #[test]
    fn test_get_or_insert_keeps_first() {
        let cache = NodeCache::new();
        let root = MergeNode::root(1);
        let first = child(&root, "a", 2);
        let second = child(&root, "a", 3);

        let (node, inserted) = cache.get_or_insert(first.clone());
        assert!(inserted);
        assert!(Arc::ptr_eq(&node, &first));

        let (node, inserted) = cache.get_or_insert(second.clone());
        assert!(!inserted);
        assert!(Arc::ptr_eq(&node, &first));

        assert!(!cache.remove_node(&second));
        assert!(cache.remove_node(&first));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_descendants() {
        let cache = NodeCache::new();
        let root = MergeNode::root(1);
        let a = child(&root, "a", 2);
        let ab = child(&a, "b", 3);
        let abc = child(&ab, "c", 4);
        let ax = child(&root, "ax", 5);
        for node in [&a, &ab, &abc, &ax] {
            cache.get_or_insert(node.clone());
        }

        let removed = cache.remove_descendants("/a");
        assert_eq!(removed.len(), 2);
        assert_eq!(cache.paths(), vec!["/a", "/ax"]);
    }
}
