// src/tree.rs

//! File tree construction
//!
//! While a set is being built its file tree is an ordinary node graph keyed
//! by `(parent, name)`. [`TreeBuilder::emit`] flattens it into the on-disk
//! layout: siblings sorted by name in one contiguous run whose last member
//! carries [`ENTRY_LAST`], and every directory's children laid out before
//! the children of its subdirectories, so the descendants of a directory
//! occupy the index range up to the next sibling directory's first child.

use crate::hashtable::{HashTable, pool_bytes};
use crate::list::RelationList;
use crate::set::{ENTRY_LAST, Entry};
use std::collections::HashMap;

/// Node id of the root directory
pub(crate) const ROOT: u32 = 0;

/// Marks nodes dropped by [`TreeBuilder::emit`]
pub(crate) const UNMAPPED: u32 = u32::MAX;

#[derive(Debug, Clone)]
struct Node {
    name: u32,
    parent: u32,
    children: Vec<u32>,
}

#[derive(Debug, Clone)]
pub(crate) struct TreeBuilder {
    nodes: Vec<Node>,
    index: HashMap<(u32, u32), u32>,
}

impl TreeBuilder {
    /// A tree holding only the root, named by file string offset 0
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                name: 0,
                parent: ROOT,
                children: Vec::new(),
            }],
            index: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// The child of `parent` called `name`, created if missing
    pub(crate) fn child(&mut self, parent: u32, name: u32) -> u32 {
        if let Some(&id) = self.index.get(&(parent, name)) {
            return id;
        }

        let id = self.nodes.len() as u32;
        self.nodes.push(Node {
            name,
            parent,
            children: Vec::new(),
        });
        self.nodes[parent as usize].children.push(id);
        self.index.insert((parent, name), id);
        id
    }

    /// Insert every component of `path`, interning names in `names`.
    /// Returns the leaf, or `None` for a path without components.
    pub(crate) fn insert_path(&mut self, names: &mut HashTable, path: &str) -> Option<u32> {
        let mut node = None;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let name = names.insert(component);
            node = Some(self.child(node.unwrap_or(ROOT), name));
        }
        node
    }

    /// Flatten the tree into entries.
    ///
    /// Only nodes flagged in `keep`, their ancestors and the root survive.
    /// Returns the entries (with empty package lists) and the node to entry
    /// index map, [`UNMAPPED`] for dropped nodes.
    pub(crate) fn emit(&self, names: &[u8], keep: &[bool]) -> (Vec<Entry>, Vec<u32>) {
        // Children always have larger ids than their parent.
        let mut kept = keep.to_vec();
        kept.resize(self.nodes.len(), false);
        for id in (1..self.nodes.len()).rev() {
            if kept[id] {
                kept[self.nodes[id].parent as usize] = true;
            }
        }
        kept[ROOT as usize] = true;

        let mut map = vec![UNMAPPED; self.nodes.len()];
        let mut entries = vec![Entry {
            name: 0,
            flags: ENTRY_LAST,
            start: 0,
            packages: RelationList::Empty,
        }];
        map[ROOT as usize] = 0;

        self.layout(ROOT, names, &kept, &mut entries, &mut map);
        (entries, map)
    }

    fn layout(&self, node: u32, names: &[u8], kept: &[bool], entries: &mut Vec<Entry>, map: &mut [u32]) {
        let mut children: Vec<u32> = self.nodes[node as usize]
            .children
            .iter()
            .copied()
            .filter(|&c| kept[c as usize])
            .collect();
        if children.is_empty() {
            return;
        }
        children.sort_by(|&a, &b| {
            let name = |id: u32| pool_bytes(names, self.nodes[id as usize].name).unwrap_or_default();
            name(a).cmp(name(b))
        });

        entries[map[node as usize] as usize].start = entries.len() as u32;
        let last = children.len() - 1;
        for (i, &child) in children.iter().enumerate() {
            map[child as usize] = entries.len() as u32;
            entries.push(Entry {
                name: self.nodes[child as usize].name,
                flags: if i == last { ENTRY_LAST } else { 0 },
                start: 0,
                packages: RelationList::Empty,
            });
        }

        for &child in &children {
            self.layout(child, names, kept, entries, map);
        }
    }
}
