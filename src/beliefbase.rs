//! Concurrent belief storage.
//!
//! Facts are partitioned by sign and functor path. Each partition key owns
//! a deduplicating, insertion-ordered bucket of literals (multi elements)
//! and at most one single element. Storage is sharded through `DashMap`,
//! so writers on unrelated keys never contend on a global lock.
//!
//! Queries iterate over a snapshot of the bucket taken at call time. A
//! mutation racing with an in-flight query may or may not be observed.

use crate::path::Path;
use crate::term::{Literal, Term};
use dashmap::DashMap;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Insertion-ordered set of shared elements.
#[derive(Debug)]
struct Bucket<N> {
    order: Vec<Arc<N>>,
    members: FxHashSet<Arc<N>>,
}

impl<N: Hash + Eq> Bucket<N> {
    fn new() -> Self {
        Bucket {
            order: Vec::new(),
            members: FxHashSet::default(),
        }
    }

    fn insert(&mut self, item: Arc<N>) -> bool {
        if !self.members.insert(item.clone()) {
            return false;
        }
        self.order.push(item);
        true
    }

    fn remove(&mut self, item: &N) -> bool {
        if !self.members.remove(item) {
            return false;
        }
        self.order.retain(|i| i.as_ref() != item);
        true
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Thread-safe storage of multi-valued and single-valued elements.
pub struct Storage<N, M> {
    multi: DashMap<Path, Bucket<N>>,
    single: DashMap<Path, M>,
}

impl<N, M> Default for Storage<N, M>
where
    N: Hash + Eq + Send + Sync,
    M: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<N, M> Storage<N, M>
where
    N: Hash + Eq + Send + Sync,
    M: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Storage {
            multi: DashMap::new(),
            single: DashMap::new(),
        }
    }

    /// Insert into the bucket of `key`. Returns true iff newly inserted.
    pub fn put_multi(&self, key: Path, item: N) -> bool {
        self.multi
            .entry(key)
            .or_insert_with(Bucket::new)
            .insert(Arc::new(item))
    }

    /// Remove from the bucket of `key`. Returns true iff it was present.
    pub fn remove_multi(&self, key: &Path, item: &N) -> bool {
        let (removed, empty) = match self.multi.get_mut(key) {
            Some(mut bucket) => {
                let removed = bucket.remove(item);
                (removed, bucket.is_empty())
            }
            None => return false,
        };
        if empty {
            self.multi.remove_if(key, |_, bucket| bucket.is_empty());
        }
        removed
    }

    /// Set the single element of `key`. Returns true iff no value existed;
    /// an existing value is overwritten either way.
    pub fn put_single(&self, key: Path, value: M) -> bool {
        self.single.insert(key, value).is_none()
    }

    /// Remove the single element of `key`. Returns true iff it existed.
    pub fn remove_single(&self, key: &Path) -> bool {
        self.single.remove(key).is_some()
    }

    pub fn single(&self, key: &Path) -> Option<M> {
        self.single.get(key).map(|entry| entry.value().clone())
    }

    /// Snapshot of the bucket of `key`, in insertion order.
    pub fn multi(&self, key: &Path) -> Vec<Arc<N>> {
        self.multi
            .get(key)
            .map(|bucket| bucket.order.clone())
            .unwrap_or_default()
    }

    pub fn contains_multi(&self, key: &Path) -> bool {
        self.multi.contains_key(key)
    }

    pub fn contains_single(&self, key: &Path) -> bool {
        self.single.contains_key(key)
    }

    /// Either kind of element exists under `key`.
    pub fn contains(&self, key: &Path) -> bool {
        self.contains_multi(key) || self.contains_single(key)
    }

    /// Check for one specific multi element.
    pub fn contains_item(&self, key: &Path, item: &N) -> bool {
        self.multi
            .get(key)
            .map_or(false, |bucket| bucket.members.contains(item))
    }

    /// Number of multi elements.
    pub fn size(&self) -> usize {
        self.multi.iter().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.multi.is_empty() && self.single.is_empty()
    }

    pub fn clear(&self) {
        self.multi.clear();
        self.single.clear();
    }
}

impl<N, M> fmt::Debug for Storage<N, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("multi_keys", &self.multi.len())
            .field("single_keys", &self.single.len())
            .finish()
    }
}

/// The agent's fact store, one storage per sign.
#[derive(Debug, Default)]
pub struct BeliefBase {
    positive: Storage<Literal, Term>,
    negative: Storage<Literal, Term>,
}

impl BeliefBase {
    pub fn new() -> Self {
        BeliefBase::default()
    }

    fn storage(&self, negated: bool) -> &Storage<Literal, Term> {
        if negated {
            &self.negative
        } else {
            &self.positive
        }
    }

    /// Add a fact. Returns true iff it was not present.
    pub fn add(&self, literal: Literal) -> bool {
        let key = literal.functor().clone();
        let added = self.storage(literal.is_negated()).put_multi(key, literal);
        tracing::trace!(added, "belief add");
        added
    }

    /// Remove a fact. Returns true iff it was present.
    pub fn remove(&self, literal: &Literal) -> bool {
        self.storage(literal.is_negated())
            .remove_multi(literal.functor(), literal)
    }

    /// Structural membership test.
    pub fn contains_literal(&self, literal: &Literal) -> bool {
        self.storage(literal.is_negated())
            .contains_item(literal.functor(), literal)
    }

    /// Any fact of either sign, or a single element, under `path`.
    pub fn contains(&self, path: &Path) -> bool {
        self.positive.contains(path) || self.negative.contains(path)
    }

    /// Sequential query: facts of `path` with the given sign in insertion order.
    pub fn query(&self, negated: bool, path: &Path) -> impl Iterator<Item = Arc<Literal>> {
        self.storage(negated).multi(path).into_iter()
    }

    /// Parallel query: same facts, unordered.
    pub fn par_query(
        &self,
        negated: bool,
        path: &Path,
    ) -> impl ParallelIterator<Item = Arc<Literal>> {
        self.storage(negated).multi(path).into_par_iter()
    }

    /// Set a single-valued slot. Returns true iff the slot was empty.
    pub fn put_single(&self, path: Path, value: Term) -> bool {
        self.positive.put_single(path, value)
    }

    pub fn single(&self, path: &Path) -> Option<Term> {
        self.positive.single(path)
    }

    pub fn remove_single(&self, path: &Path) -> bool {
        self.positive.remove_single(path)
    }

    /// Number of facts of both signs.
    pub fn size(&self) -> usize {
        self.positive.size() + self.negative.size()
    }

    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }

    pub fn clear(&self) {
        self.positive.clear();
        self.negative.clear();
    }
}
