//! Keyed cache with single-flight refresh and generation-guarded commits.
//!
//! Each key carries a monotonically increasing generation. Starting a fetch
//! or invalidating a key bumps it, and a finished fetch is only committed
//! when its generation is still the latest one for the key. Concurrent
//! readers of the same key and tag share one in-flight fetch through a
//! `watch` channel.

use crate::error::{FeeError, Result};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::time::Instant;
use tokio::sync::{Mutex, watch};

/// What a caller gets back from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheView<V> {
    pub value: V,
    /// Set when the value may be outdated: a refresh failed, the entry was
    /// invalidated, or the value was derived from stale inputs.
    pub stale: bool,
    pub generation: u64,
    pub refreshed_at: Instant,
}

/// The result of a fetch handed to the cache.
#[derive(Debug, Clone)]
pub struct Fetched<V> {
    pub value: V,
    pub from_stale_inputs: bool,
}

impl<V> Fetched<V> {
    pub fn fresh(value: V) -> Self {
        Self {
            value,
            from_stale_inputs: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Fresh,
    Invalidated,
    Stale,
}

struct Entry<T, V> {
    tag: T,
    value: V,
    state: EntryState,
    generation: u64,
    refreshed_at: Instant,
}

impl<T, V: Clone> Entry<T, V> {
    fn view(&self) -> CacheView<V> {
        CacheView {
            value: self.value.clone(),
            stale: self.state != EntryState::Fresh,
            generation: self.generation,
            refreshed_at: self.refreshed_at,
        }
    }
}

type Outcome<V> = Option<Result<CacheView<V>>>;

struct Flight<T, V> {
    generation: u64,
    tag: T,
    rx: watch::Receiver<Outcome<V>>,
}

impl<T, V> Flight<T, V> {
    /// The leading task was dropped before publishing a result.
    fn is_abandoned(&self) -> bool {
        self.rx.has_changed().is_err() && self.rx.borrow().is_none()
    }
}

enum Plan<V> {
    Hit(CacheView<V>),
    Join(watch::Receiver<Outcome<V>>),
    Lead(u64, watch::Sender<Outcome<V>>),
}

struct Slots<K, T, V> {
    entries: HashMap<K, Entry<T, V>>,
    /// Only keys that were fetched at least once. A counter is never removed
    /// while a detached fetch could still settle against it, so this grows
    /// with the key set, like `entries`.
    generations: HashMap<K, u64>,
    flights: HashMap<K, Flight<T, V>>,
}

impl<K, T, V> Slots<K, T, V>
where
    K: Eq + Hash + Clone + Debug,
    T: Clone + PartialEq + Debug,
    V: Clone,
{
    fn latest(&self, key: &K) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: &K) -> u64 {
        let generation = self.generations.entry(key.clone()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn plan(&mut self, cache: &str, key: &K, tag: &T, force: bool) -> Plan<V> {
        if !force {
            if let Some(entry) = self.entries.get(key) {
                if entry.state == EntryState::Fresh && entry.tag == *tag {
                    tracing::debug!(cache, ?key, "cache hit");
                    return Plan::Hit(entry.view());
                }
                if entry.tag != *tag {
                    tracing::debug!(cache, ?key, cached = ?entry.tag, requested = ?tag, "tag mismatch, treating as miss");
                }
            }
            if let Some(flight) = self.flights.get(key)
                && flight.tag == *tag
                && !flight.is_abandoned()
            {
                tracing::debug!(cache, ?key, generation = flight.generation, "joining in-flight refresh");
                return Plan::Join(flight.rx.clone());
            }
        }

        let generation = self.bump(key);
        let (tx, rx) = watch::channel(None);
        self.flights.insert(
            key.clone(),
            Flight {
                generation,
                tag: tag.clone(),
                rx,
            },
        );
        tracing::debug!(cache, ?key, generation, force, "starting refresh");
        Plan::Lead(generation, tx)
    }

    fn settle(
        &mut self,
        cache: &str,
        key: &K,
        tag: &T,
        generation: u64,
        result: Result<Fetched<V>>,
    ) -> Result<CacheView<V>> {
        if self
            .flights
            .get(key)
            .is_some_and(|flight| flight.generation == generation)
        {
            self.flights.remove(key);
        }
        let is_latest = self.latest(key) == generation;

        match result {
            Ok(fetched) => {
                let state = if fetched.from_stale_inputs {
                    EntryState::Stale
                } else {
                    EntryState::Fresh
                };
                let entry = Entry {
                    tag: tag.clone(),
                    value: fetched.value,
                    state,
                    generation,
                    refreshed_at: Instant::now(),
                };
                let view = entry.view();
                if is_latest {
                    self.entries.insert(key.clone(), entry);
                } else {
                    tracing::debug!(
                        cache,
                        ?key,
                        generation,
                        latest = self.latest(key),
                        "discarding superseded result"
                    );
                }
                Ok(view)
            }
            Err(err) if err.is_retryable() => match self.entries.get_mut(key) {
                Some(entry) if entry.tag == *tag => {
                    if is_latest {
                        entry.state = EntryState::Stale;
                    }
                    tracing::warn!(cache, ?key, error = %err, "refresh failed, serving last known value");
                    let mut view = entry.view();
                    view.stale = true;
                    Ok(view)
                }
                _ => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    fn invalidate(&mut self, key: &K) -> bool {
        // A key that was never fetched has nothing to supersede.
        if !self.generations.contains_key(key) {
            return false;
        }
        self.bump(key);
        self.flights.remove(key);
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.state = EntryState::Invalidated;
                true
            }
            None => false,
        }
    }
}

pub struct RefreshCache<K, T, V> {
    name: &'static str,
    slots: Mutex<Slots<K, T, V>>,
}

impl<K, T, V> RefreshCache<K, T, V>
where
    K: Eq + Hash + Clone + Debug,
    T: Clone + PartialEq + Debug,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Mutex::new(Slots {
                entries: HashMap::new(),
                generations: HashMap::new(),
                flights: HashMap::new(),
            }),
        }
    }

    /// Returns the cached value for `key` when it is fresh and was computed
    /// for `tag`; otherwise joins a matching in-flight fetch or runs `fetch`.
    ///
    /// `force` skips both the cached value and any in-flight fetch.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        key: &K,
        tag: &T,
        force: bool,
        fetch: F,
    ) -> Result<CacheView<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Fetched<V>>>,
    {
        let plan = self.slots.lock().await.plan(self.name, key, tag, force);

        match plan {
            Plan::Hit(view) => Ok(view),
            Plan::Join(mut rx) => match rx.wait_for(Option::is_some).await {
                Ok(outcome) => (*outcome).clone().unwrap_or_else(|| Err(abandoned(key))),
                Err(_) => Err(abandoned(key)),
            },
            Plan::Lead(generation, tx) => {
                let result = fetch().await;
                let outcome = self
                    .slots
                    .lock()
                    .await
                    .settle(self.name, key, tag, generation, result);
                tx.send_replace(Some(outcome.clone()));
                outcome
            }
        }
    }

    /// Marks the entry for `key` as needing a refresh. The value is kept as
    /// a fallback and any in-flight fetch for the key will not be committed.
    pub async fn invalidate(&self, key: &K) -> bool {
        let invalidated = self.slots.lock().await.invalidate(key);
        tracing::debug!(cache = self.name, ?key, invalidated, "invalidated");
        invalidated
    }

    /// Invalidates every entry whose value matches `predicate`.
    pub async fn invalidate_where<P>(&self, predicate: P) -> Vec<K>
    where
        P: Fn(&V) -> bool,
    {
        let mut slots = self.slots.lock().await;
        let keys: Vec<K> = slots
            .entries
            .iter()
            .filter(|(_, entry)| predicate(&entry.value))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            slots.invalidate(key);
        }
        keys
    }

    pub async fn peek(&self, key: &K) -> Option<CacheView<V>> {
        self.slots.lock().await.entries.get(key).map(Entry::view)
    }

    pub async fn generation(&self, key: &K) -> u64 {
        self.slots.lock().await.latest(key)
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn abandoned<K: Debug>(key: &K) -> FeeError {
    FeeError::Network(format!("in-flight refresh for {key:?} was abandoned"))
}
