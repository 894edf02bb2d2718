//! The trie proper: lookup, upsert, and batched commit.

use std::sync::Arc;

use dpos_storage::{KvStore, WriteBatch};
use tracing::debug;

use crate::error::{MptError, MptResult};
use crate::helper::{common_prefix_length, to_nibbles};
use crate::node::{Hash256, Node, EMPTY_ROOT, ZERO_HASH};

/// Merkle Patricia trie rooted in one namespace of a [`KvStore`].
///
/// Mutations accumulate in memory; [`Trie::commit`] persists every
/// materialized node in a single batch write, keyed by node hash. Nodes
/// made unreachable by later updates are left in place, which keeps
/// earlier roots readable.
pub struct Trie {
    db: Arc<dyn KvStore>,
    namespace: String,
    root: Option<Box<Node>>,
}

impl Trie {
    /// Opens a trie at `root` inside `namespace`.
    ///
    /// [`EMPTY_ROOT`] and [`ZERO_HASH`] both denote an empty trie. Any
    /// other root must be resolvable in the store, otherwise
    /// [`MptError::MissingNode`] is returned.
    pub fn new(db: Arc<dyn KvStore>, namespace: &str, root: Hash256) -> MptResult<Self> {
        let root_node = if root == EMPTY_ROOT || root == ZERO_HASH {
            None
        } else {
            Some(Box::new(load_node(db.as_ref(), namespace, &root)?))
        };
        Ok(Self {
            db,
            namespace: namespace.to_string(),
            root: root_node,
        })
    }

    /// The store this trie persists into.
    pub fn database(&self) -> Arc<dyn KvStore> {
        Arc::clone(&self.db)
    }

    /// The namespace this trie persists into.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Root hash over the current in-memory state, committed or not.
    pub fn root_hash(&self) -> Hash256 {
        self.root.as_ref().map_or(EMPTY_ROOT, |node| node.hash())
    }

    /// Looks up `key`. Returns `Ok(None)` when the key is absent.
    pub fn get(&mut self, key: &[u8]) -> MptResult<Option<Vec<u8>>> {
        let path = to_nibbles(key);
        let mut root = match self.root.take() {
            Some(node) => node,
            None => return Ok(None),
        };
        let result = get_at(self.db.as_ref(), &self.namespace, &mut root, &path);
        self.root = Some(root);
        result
    }

    /// Inserts or overwrites `key` with `value`.
    ///
    /// The insert works on a copy of the materialized tree, so a failure
    /// leaves the trie at its prior state.
    pub fn upsert(&mut self, key: &[u8], value: &[u8]) -> MptResult<()> {
        let path = to_nibbles(key);
        let new_root = insert_at(
            self.db.as_ref(),
            &self.namespace,
            self.root.clone(),
            &path,
            value.to_vec(),
        )?;
        self.root = Some(new_root);
        Ok(())
    }

    /// Persists every materialized node in one batch write and returns the
    /// committed root hash.
    pub fn commit(&mut self) -> MptResult<Hash256> {
        let root = match self.root.as_ref() {
            Some(node) => node,
            None => return Ok(EMPTY_ROOT),
        };
        let mut nodes = Vec::new();
        let root_hash = root.collect(&mut nodes);

        let mut batch = WriteBatch::new();
        for (hash, bytes) in &nodes {
            batch.put(&self.namespace, hash, bytes);
        }
        debug!(
            target: "dpos::mpt",
            namespace = %self.namespace,
            nodes = nodes.len(),
            root = %hex::encode(root_hash),
            "committing trie"
        );
        self.db.write_batch(batch)?;
        Ok(root_hash)
    }
}

fn load_node(db: &dyn KvStore, namespace: &str, hash: &Hash256) -> MptResult<Node> {
    let bytes = db
        .get(namespace, hash)?
        .ok_or_else(|| MptError::missing_node(hash))?;
    Node::decode(&bytes)
}

/// Replaces a `Hash` node with its persisted contents, in place.
fn resolve(db: &dyn KvStore, namespace: &str, node: &mut Node) -> MptResult<()> {
    if let Node::Hash { hash } = node {
        let hash = *hash;
        *node = load_node(db, namespace, &hash)?;
    }
    Ok(())
}

fn get_at(
    db: &dyn KvStore,
    namespace: &str,
    node: &mut Node,
    path: &[u8],
) -> MptResult<Option<Vec<u8>>> {
    resolve(db, namespace, node)?;
    match node {
        Node::Leaf {
            path: leaf_path,
            value,
        } => {
            if leaf_path.as_slice() == path {
                Ok(Some(value.clone()))
            } else {
                Ok(None)
            }
        }
        Node::Extension {
            path: ext_path,
            child,
        } => {
            if path.len() < ext_path.len() || &path[..ext_path.len()] != ext_path.as_slice() {
                return Ok(None);
            }
            let rest = path[ext_path.len()..].to_vec();
            get_at(db, namespace, child, &rest)
        }
        Node::Branch { children } => {
            let (&index, rest) = path
                .split_first()
                .ok_or_else(|| MptError::corrupt("key exhausted at branch"))?;
            match children[index as usize].as_deref_mut() {
                Some(child) => get_at(db, namespace, child, rest),
                None => Ok(None),
            }
        }
        Node::Hash { .. } => Err(MptError::corrupt("unresolved hash node")),
    }
}

fn insert_at(
    db: &dyn KvStore,
    namespace: &str,
    node: Option<Box<Node>>,
    path: &[u8],
    value: Vec<u8>,
) -> MptResult<Box<Node>> {
    let mut node = match node {
        None => {
            return Ok(Box::new(Node::Leaf {
                path: path.to_vec(),
                value,
            }))
        }
        Some(node) => node,
    };
    resolve(db, namespace, node.as_mut())?;

    match *node {
        Node::Leaf {
            path: leaf_path,
            value: leaf_value,
        } => {
            if leaf_path.as_slice() == path {
                return Ok(Box::new(Node::Leaf {
                    path: leaf_path,
                    value,
                }));
            }
            let common = common_prefix_length(&leaf_path, path);
            // equal key lengths guarantee both sides still have a nibble
            if common >= leaf_path.len() || common >= path.len() {
                return Err(MptError::corrupt("key is a prefix of another key"));
            }
            let mut children: [Option<Box<Node>>; 16] = Default::default();
            children[leaf_path[common] as usize] = Some(Box::new(Node::Leaf {
                path: leaf_path[common + 1..].to_vec(),
                value: leaf_value,
            }));
            children[path[common] as usize] = Some(Box::new(Node::Leaf {
                path: path[common + 1..].to_vec(),
                value,
            }));
            Ok(wrap_extension(
                &path[..common],
                Box::new(Node::Branch { children }),
            ))
        }
        Node::Extension {
            path: ext_path,
            child,
        } => {
            let common = common_prefix_length(&ext_path, path);
            if common == ext_path.len() {
                if common == path.len() {
                    return Err(MptError::corrupt("key is a prefix of another key"));
                }
                let child = insert_at(db, namespace, Some(child), &path[common..], value)?;
                return Ok(Box::new(Node::Extension {
                    path: ext_path,
                    child,
                }));
            }
            if common >= path.len() {
                return Err(MptError::corrupt("key is a prefix of another key"));
            }
            let mut children: [Option<Box<Node>>; 16] = Default::default();
            let ext_rest = ext_path[common + 1..].to_vec();
            children[ext_path[common] as usize] = Some(if ext_rest.is_empty() {
                child
            } else {
                Box::new(Node::Extension {
                    path: ext_rest,
                    child,
                })
            });
            children[path[common] as usize] = Some(Box::new(Node::Leaf {
                path: path[common + 1..].to_vec(),
                value,
            }));
            Ok(wrap_extension(
                &path[..common],
                Box::new(Node::Branch { children }),
            ))
        }
        Node::Branch { mut children } => {
            let (&index, rest) = path
                .split_first()
                .ok_or_else(|| MptError::corrupt("key exhausted at branch"))?;
            let child = children[index as usize].take();
            children[index as usize] = Some(insert_at(db, namespace, child, rest, value)?);
            Ok(Box::new(Node::Branch { children }))
        }
        Node::Hash { .. } => Err(MptError::corrupt("unresolved hash node")),
    }
}

fn wrap_extension(prefix: &[u8], node: Box<Node>) -> Box<Node> {
    if prefix.is_empty() {
        node
    } else {
        Box::new(Node::Extension {
            path: prefix.to_vec(),
            child: node,
        })
    }
}
