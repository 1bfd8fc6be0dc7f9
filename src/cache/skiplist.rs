//! Skip List Module
//!
//! Ordered map from `i64` timestamps to values, used as the cache's
//! expiration index.
//!
//! Nodes live in an arena and link to each other through slot indices, so
//! splicing a node in or out only rewrites integers in `forward` arrays.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

// == Public Constants ==
/// Default number of levels.
pub const DEFAULT_MAX_LEVEL: usize = 18;

/// Default promotion probability between levels (1/e).
pub const DEFAULT_PROBABILITY: f64 = 1.0 / std::f64::consts::E;

type NodeId = usize;

#[derive(Debug)]
struct Node<V> {
    key: i64,
    value: V,
    /// One link per level the node participates in
    forward: Vec<Option<NodeId>>,
}

// == Skip List ==
/// A skip list keyed by `i64`.
///
/// Expected O(log n) insert, lookup and removal; O(1) access to the minimum.
#[derive(Debug)]
pub struct SkipList<V> {
    /// Forward links of the sentinel root, one per level
    head: Vec<Option<NodeId>>,
    nodes: Vec<Option<Node<V>>>,
    free: Vec<NodeId>,
    len: usize,
    max_level: usize,
    /// `prob_table[i]` is the chance a node reaches level `i + 1`
    prob_table: Vec<f64>,
    rng: SmallRng,
    /// Scratch buffer reused by every predecessor search
    prevs: Vec<Option<NodeId>>,
}

impl<V> SkipList<V> {
    // == Constructors ==
    /// Creates an empty list with [`DEFAULT_MAX_LEVEL`] levels.
    pub fn new() -> Self {
        Self::with_max_level(DEFAULT_MAX_LEVEL)
    }

    /// Creates an empty list with `max_level` levels (at least one).
    pub fn with_max_level(max_level: usize) -> Self {
        Self::with_rng(max_level, SmallRng::from_entropy())
    }

    /// Creates an empty list whose level draws are reproducible.
    pub fn with_seed(max_level: usize, seed: u64) -> Self {
        Self::with_rng(max_level, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(max_level: usize, rng: SmallRng) -> Self {
        let max_level = max_level.max(1);
        Self {
            head: vec![None; max_level],
            nodes: Vec::new(),
            free: Vec::new(),
            len: 0,
            max_level,
            prob_table: probability_table(DEFAULT_PROBABILITY, max_level),
            rng,
            prevs: vec![None; max_level],
        }
    }

    // == Accessors ==
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }

    // == Add ==
    /// Inserts `value` under `key`, replacing the value in place if the key
    /// is already present.
    pub fn add(&mut self, key: i64, value: V) {
        let mut prevs = std::mem::take(&mut self.prevs);
        self.fill_predecessors(key, &mut prevs);

        if let Some(id) = self.next_of(prevs[0], 0) {
            let node = self.node_mut(id);
            if node.key == key {
                node.value = value;
                self.prevs = prevs;
                return;
            }
        }

        let level = self.random_level();
        let forward = (0..level).map(|l| self.next_of(prevs[l], l)).collect();
        let id = self.alloc(Node {
            key,
            value,
            forward,
        });
        for (l, prev) in prevs.iter().take(level).enumerate() {
            self.set_next(*prev, l, Some(id));
        }

        self.len += 1;
        self.prevs = prevs;
    }

    // == Get ==
    /// Returns the value stored under exactly `key`.
    pub fn get(&self, key: i64) -> Option<&V> {
        let id = self.seek(key)?;
        let node = self.node(id);
        (node.key == key).then_some(&node.value)
    }

    /// Mutable variant of [`SkipList::get`].
    pub fn get_mut(&mut self, key: i64) -> Option<&mut V> {
        let id = self.seek(key)?;
        let node = self.node_mut(id);
        if node.key == key {
            Some(&mut node.value)
        } else {
            None
        }
    }

    // == Remove ==
    /// Unlinks `key` from every level it occupies and returns its value.
    pub fn remove(&mut self, key: i64) -> Option<V> {
        let mut prevs = std::mem::take(&mut self.prevs);
        self.fill_predecessors(key, &mut prevs);

        let removed = match self.next_of(prevs[0], 0) {
            Some(id) if self.node(id).key == key => {
                let node = self.nodes[id].take().expect("skip list links a freed slot");
                for (l, next) in node.forward.iter().enumerate() {
                    self.set_next(prevs[l], l, *next);
                }
                self.free.push(id);
                self.len -= 1;
                Some(node.value)
            }
            _ => None,
        };

        self.prevs = prevs;
        removed
    }

    // == Head ==
    /// Returns the entry with the smallest key.
    pub fn head(&self) -> Option<(i64, &V)> {
        self.head[0].map(|id| {
            let node = self.node(id);
            (node.key, &node.value)
        })
    }

    // == Iteration ==
    /// Returns an unpositioned cursor; call [`Cursor::first`] or
    /// [`Cursor::seek_ge`] before reading from it.
    pub fn cursor(&self) -> Cursor<'_, V> {
        Cursor {
            list: self,
            current: None,
        }
    }

    /// Iterates over all entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            list: self,
            current: self.head[0],
        }
    }

    /// Iterates in ascending key order starting at the first key `>= key`.
    pub fn range_from(&self, key: i64) -> Iter<'_, V> {
        Iter {
            list: self,
            current: self.seek(key),
        }
    }

    /// Verifies level ordering and level containment.
    ///
    /// # Panics
    /// Panics if any level is out of order, a node is missing from a level it
    /// claims, or the length counter disagrees with level 0.
    pub fn check_structure(&self) {
        for level in 0..self.max_level {
            let mut count_at_level = 0;
            let mut last_key: Option<i64> = None;
            let mut cursor = self.head[level];
            while let Some(id) = cursor {
                let node = self.node(id);
                assert!(
                    node.forward.len() > level,
                    "node {} linked at level {} above its height",
                    node.key,
                    level
                );
                if let Some(prev) = last_key {
                    assert!(prev < node.key, "level {} out of order: {} then {}", level, prev, node.key);
                }
                last_key = Some(node.key);
                count_at_level += 1;
                cursor = node.forward[level];
            }
            let expected = self
                .nodes
                .iter()
                .flatten()
                .filter(|n| n.forward.len() > level)
                .count();
            assert_eq!(count_at_level, expected, "level {} skips nodes", level);
        }
        assert_eq!(
            self.nodes.iter().flatten().count(),
            self.len,
            "length counter out of sync"
        );
    }

    // == Internals ==
    /// First node whose key is `>= key`.
    fn seek(&self, key: i64) -> Option<NodeId> {
        let mut prev = None;
        for level in (0..self.max_level).rev() {
            while let Some(next) = self.next_of(prev, level) {
                if self.node(next).key >= key {
                    break;
                }
                prev = Some(next);
            }
        }
        self.next_of(prev, 0)
    }

    /// Records, per level, the last node whose key is `< key`.
    fn fill_predecessors(&self, key: i64, prevs: &mut [Option<NodeId>]) {
        let mut prev = None;
        for level in (0..self.max_level).rev() {
            while let Some(next) = self.next_of(prev, level) {
                if self.node(next).key >= key {
                    break;
                }
                prev = Some(next);
            }
            prevs[level] = prev;
        }
    }

    fn random_level(&mut self) -> usize {
        let r: f64 = self.rng.gen();
        let mut level = 1;
        while level < self.max_level && r < self.prob_table[level] {
            level += 1;
        }
        level
    }

    /// `None` as `prev` stands for the sentinel root.
    fn next_of(&self, prev: Option<NodeId>, level: usize) -> Option<NodeId> {
        match prev {
            None => self.head[level],
            Some(id) => self.node(id).forward[level],
        }
    }

    fn set_next(&mut self, prev: Option<NodeId>, level: usize, next: Option<NodeId>) {
        match prev {
            None => self.head[level] = next,
            Some(id) => self.node_mut(id).forward[level] = next,
        }
    }

    fn alloc(&mut self, node: Node<V>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn node(&self, id: NodeId) -> &Node<V> {
        self.nodes[id].as_ref().expect("skip list links a freed slot")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<V> {
        self.nodes[id].as_mut().expect("skip list links a freed slot")
    }
}

impl<V> Default for SkipList<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn probability_table(probability: f64, max_level: usize) -> Vec<f64> {
    (0..max_level).map(|i| probability.powi(i as i32)).collect()
}

// == Cursor ==
/// Forward cursor over the bottom level of a [`SkipList`].
pub struct Cursor<'a, V> {
    list: &'a SkipList<V>,
    current: Option<NodeId>,
}

impl<'a, V> Cursor<'a, V> {
    /// Positions the cursor on the smallest key.
    pub fn first(&mut self) {
        self.current = self.list.head[0];
    }

    /// Positions the cursor on the first key `>= key`.
    pub fn seek_ge(&mut self, key: i64) {
        self.current = self.list.seek(key);
    }

    /// Steps to the next key. Stepping past the end leaves the cursor invalid.
    pub fn next(&mut self) {
        if let Some(id) = self.current {
            self.current = self.list.node(id).forward[0];
        }
    }

    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    pub fn key_value(&self) -> Option<(i64, &'a V)> {
        let list = self.list;
        self.current.map(|id| {
            let node = list.node(id);
            (node.key, &node.value)
        })
    }
}

// == Iter ==
/// Ascending iterator returned by [`SkipList::iter`] and [`SkipList::range_from`].
pub struct Iter<'a, V> {
    list: &'a SkipList<V>,
    current: Option<NodeId>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (i64, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let list = self.list;
        let node = list.node(self.current?);
        self.current = node.forward[0];
        Some((node.key, &node.value))
    }
}
