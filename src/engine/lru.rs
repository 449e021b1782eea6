use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;

#[derive(Default, Clone, Copy)]
struct LruNode {
    newer: Option<usize>,
    older: Option<usize>,
}

struct Slot<K, V> {
    key: K,
    value: V,
    weight: usize,
}

/// Slot-based LRU cache bounded by an entry count and a total weight.
///
/// Eviction happens synchronously inside [`LruCache::insert`], least recently
/// used first.
pub(crate) struct LruCache<K, V> {
    capacity: usize,
    max_weight: usize,
    total_weight: usize,
    weigher: fn(&V) -> usize,

    slots: Vec<Option<Slot<K, V>>>,

    lru_nodes: Vec<LruNode>,
    lru_head: Option<usize>,
    lru_tail: Option<usize>,
    lru_map: HashMap<K, usize, fxhash::FxBuildHasher>,
    lru_empties: Vec<usize>,
}

impl<K: Copy + Eq + Hash, V> LruCache<K, V> {
    /// Cache bounded by entry count only.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_weight_budget(capacity, usize::MAX, |_| 0)
    }

    pub fn with_weight_budget(
        capacity: NonZeroUsize,
        max_weight: usize,
        weigher: fn(&V) -> usize,
    ) -> Self {
        let capacity = capacity.get();

        Self {
            capacity,
            max_weight,
            total_weight: 0,
            weigher,
            slots: (0..capacity).map(|_| None).collect(),
            lru_nodes: vec![LruNode::default(); capacity],
            lru_head: None,
            lru_tail: None,
            lru_map: HashMap::with_capacity_and_hasher(capacity, fxhash::FxBuildHasher::default()),
            lru_empties: (0..capacity).collect(),
        }
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.lru_nodes.fill(LruNode::default());
        self.lru_map.clear();
        self.lru_empties = (0..self.capacity).collect();
        self.lru_head = None;
        self.lru_tail = None;
        self.total_weight = 0;
    }

    pub fn len(&self) -> usize {
        self.lru_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lru_map.is_empty()
    }

    pub fn total_weight(&self) -> usize {
        self.total_weight
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.lru_map.contains_key(key)
    }

    /// Returns the cached value and marks it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let index = *self.lru_map.get(key)?;
        self.move_to_front(index);
        self.slots[index].as_ref().map(|slot| &slot.value)
    }

    /// Inserts `value`, replacing any previous value for `key`, and evicts
    /// least recently used entries until both bounds hold again.
    pub fn insert(&mut self, key: K, value: V) -> &V {
        if let Some(&index) = self.lru_map.get(&key) {
            self.remove_index(index);
        }

        let weight = (self.weigher)(&value);
        while self.lru_tail.is_some()
            && (self.lru_empties.is_empty()
                || self.total_weight.saturating_add(weight) > self.max_weight)
        {
            self.evict_tail();
        }

        let index = self.lru_empties.pop().expect("eviction frees a slot");
        self.slots[index] = Some(Slot { key, value, weight });
        self.total_weight += weight;
        self.lru_map.insert(key, index);
        self.attach_to_head(index);

        &self.slots[index].as_ref().expect("just inserted").value
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let index = *self.lru_map.get(key)?;
        self.remove_index(index)
    }

    /// Drops every entry whose key does not satisfy `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        let doomed: Vec<usize> = self
            .lru_map
            .iter()
            .filter(|(key, _)| !keep(key))
            .map(|(_, &index)| index)
            .collect();

        for index in doomed {
            self.remove_index(index);
        }
    }
}

/// internal helpers
impl<K: Copy + Eq + Hash, V> LruCache<K, V> {
    fn evict_tail(&mut self) {
        if let Some(tail_idx) = self.lru_tail {
            self.remove_index(tail_idx);
        }
    }

    fn remove_index(&mut self, index: usize) -> Option<V> {
        let slot = self.slots[index].take()?;
        self.detach(index);
        self.lru_map.remove(&slot.key);
        self.lru_empties.push(index);
        self.total_weight -= slot.weight;
        Some(slot.value)
    }

    fn detach(&mut self, index: usize) {
        let LruNode { newer, older } = self.lru_nodes[index];

        match newer {
            Some(newer_idx) => self.lru_nodes[newer_idx].older = older,
            // node was head
            None => self.lru_head = older,
        }
        match older {
            Some(older_idx) => self.lru_nodes[older_idx].newer = newer,
            // node was tail
            None => self.lru_tail = newer,
        }

        self.lru_nodes[index] = LruNode::default();
    }

    fn attach_to_head(&mut self, index: usize) {
        // set node
        self.lru_nodes[index].newer = None;
        self.lru_nodes[index].older = self.lru_head;

        // update old head
        if let Some(old_head_idx) = self.lru_head {
            self.lru_nodes[old_head_idx].newer = Some(index);
        }

        // update new head and tail
        self.lru_head = Some(index);
        if self.lru_tail.is_none() {
            self.lru_tail = Some(index);
        }
    }

    fn move_to_front(&mut self, index: usize) {
        if self.lru_head == Some(index) {
            return;
        }
        self.detach(index);
        self.attach_to_head(index);
    }
}
