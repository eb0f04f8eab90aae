//! Process-wide read-through cache for repository queries.
//!
//! Every read goes through [`QueryCache::fetch`] under a [`CacheKey`]. A
//! fresh slot answers without I/O; concurrent readers of a slot that is
//! already loading share one backend request; writes invalidate the keys
//! they affect.
//!
//! Each fetch is tagged with a request id from a global counter. A response
//! is stored only if its id is still the slot's latest, and invalidation
//! advances the slot's latest id, so a read that started before a write can
//! never overwrite the slot after it.

use std::{
  any::Any,
  collections::HashMap,
  fmt,
  future::Future,
  sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
  },
  time::{Duration, Instant},
};

use portal_core::gateway::Table;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{Error, Result, error::Message, lock};

// ─── Keys ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
  /// Every row of a table (or the slice of it a repository lists).
  Collection(Table),
  /// One row by id.
  Entity(Table, Uuid),
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Collection(table) => write!(f, "collection:{table}"),
      Self::Entity(table, id) => write!(f, "entity:{table}:{id}"),
    }
  }
}

// ─── Slots ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Fresh,
  Stale,
  Loading,
}

type Value = Arc<dyn Any + Send + Sync>;
type Outcome = Option<Result<Value>>;

struct Slot {
  value:          Option<Value>,
  status:         Status,
  fetched_at:     Option<Instant>,
  latest_request: u64,
  in_flight:      Option<watch::Receiver<Outcome>>,
}

impl Slot {
  fn empty() -> Self {
    Self {
      value:          None,
      status:         Status::Stale,
      fetched_at:     None,
      latest_request: 0,
      in_flight:      None,
    }
  }
}

enum Plan {
  Hit(Value),
  Join(watch::Receiver<Outcome>),
  Fetch(u64, watch::Sender<Outcome>),
}

// ─── Cache ───────────────────────────────────────────────────────────────────

/// Shared handle to the cache. Clones refer to the same slots.
#[derive(Clone)]
pub struct QueryCache {
  inner: Arc<Inner>,
}

struct Inner {
  slots:        Mutex<HashMap<CacheKey, Slot>>,
  next_request: AtomicU64,
  stale_time:   Duration,
}

impl QueryCache {
  pub fn new(stale_time: Duration) -> Self {
    Self {
      inner: Arc::new(Inner {
        slots: Mutex::new(HashMap::new()),
        next_request: AtomicU64::new(1),
        stale_time,
      }),
    }
  }

  /// Read `key`, calling `fetcher` only if no fresh value is cached and no
  /// other caller is already loading it.
  pub async fn fetch<T, F, Fut>(&self, key: CacheKey, fetcher: F) -> Result<T>
  where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let (request, tx) = loop {
      match self.plan(key) {
        Plan::Hit(value) => {
          tracing::debug!(%key, "cache hit");
          return downcast(key, &value);
        }
        Plan::Join(mut rx) => {
          tracing::debug!(%key, "joining in-flight request");
          let outcome = rx.wait_for(Option::is_some).await.map(|o| o.clone());
          match outcome {
            Ok(Some(result)) => return result.and_then(|v| downcast(key, &v)),
            // The fetching caller went away before answering.
            _ => continue,
          }
        }
        Plan::Fetch(request, tx) => break (request, tx),
      }
    };

    tracing::debug!(%key, request, "fetching");
    let mut guard = InFlight { cache: self, key, request, armed: true };
    let result = fetcher().await.map(|v| Arc::new(v) as Value);
    self.settle(key, request, &result);
    guard.armed = false;
    tx.send_replace(Some(result.clone()));

    result.and_then(|v| downcast(key, &v))
  }

  /// The last successfully fetched value for `key`, whatever its status.
  pub fn peek<T>(&self, key: CacheKey) -> Option<T>
  where
    T: Clone + 'static,
  {
    let slots = lock(&self.inner.slots);
    slots
      .get(&key)
      .and_then(|slot| slot.value.as_ref())
      .and_then(|value| value.downcast_ref::<T>().cloned())
  }

  pub fn status(&self, key: CacheKey) -> Option<Status> {
    lock(&self.inner.slots).get(&key).map(|slot| slot.status)
  }

  /// Mark `key` stale. The next read refetches, and any response already
  /// in flight for it will not be stored.
  pub fn invalidate(&self, key: CacheKey) {
    let mut slots = lock(&self.inner.slots);
    if let Some(slot) = slots.get_mut(&key) {
      slot.status = Status::Stale;
      slot.in_flight = None;
      slot.latest_request = self.next_request();
      tracing::debug!(%key, "invalidated");
    }
  }

  pub fn invalidate_all(&self, keys: impl IntoIterator<Item = CacheKey>) {
    for key in keys {
      self.invalidate(key);
    }
  }

  /// Drop every slot.
  pub fn clear(&self) {
    lock(&self.inner.slots).clear();
    tracing::debug!("cache cleared");
  }

  fn next_request(&self) -> u64 {
    self.inner.next_request.fetch_add(1, Ordering::Relaxed)
  }

  fn plan(&self, key: CacheKey) -> Plan {
    let mut slots = lock(&self.inner.slots);
    let slot = slots.entry(key).or_insert_with(Slot::empty);

    match slot.status {
      Status::Fresh
        if slot
          .fetched_at
          .is_some_and(|at| at.elapsed() < self.inner.stale_time) =>
      {
        if let Some(value) = &slot.value {
          return Plan::Hit(Arc::clone(value));
        }
      }
      Status::Loading => {
        if let Some(rx) = &slot.in_flight {
          return Plan::Join(rx.clone());
        }
      }
      _ => {}
    }

    let request = self.next_request();
    let (tx, rx) = watch::channel(None);
    slot.status = Status::Loading;
    slot.latest_request = request;
    slot.in_flight = Some(rx);
    Plan::Fetch(request, tx)
  }

  fn settle(&self, key: CacheKey, request: u64, result: &Result<Value>) {
    let mut slots = lock(&self.inner.slots);
    let Some(slot) = slots.get_mut(&key).filter(|s| s.latest_request == request)
    else {
      tracing::debug!(%key, request, "discarding superseded response");
      return;
    };

    slot.in_flight = None;
    match result {
      Ok(value) => {
        slot.value = Some(Arc::clone(value));
        slot.status = Status::Fresh;
        slot.fetched_at = Some(Instant::now());
      }
      Err(_) => slot.status = Status::Stale,
    }
  }

  fn release(&self, key: CacheKey, request: u64) {
    let mut slots = lock(&self.inner.slots);
    if let Some(slot) = slots.get_mut(&key).filter(|s| s.latest_request == request)
    {
      slot.in_flight = None;
      slot.status = Status::Stale;
    }
  }
}

/// Returns the slot to `Stale` if the fetching future is dropped before it
/// settles, so joined readers start over instead of waiting forever.
struct InFlight<'a> {
  cache:   &'a QueryCache,
  key:     CacheKey,
  request: u64,
  armed:   bool,
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    if self.armed {
      tracing::debug!(key = %self.key, "fetch abandoned");
      self.cache.release(self.key, self.request);
    }
  }
}

fn downcast<T: Clone + 'static>(key: CacheKey, value: &Value) -> Result<T> {
  value.downcast_ref::<T>().cloned().ok_or_else(|| {
    Error::repository(Message(format!(
      "cached value for {key} has an unexpected type"
    )))
  })
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;

  use tokio::time::sleep;

  use super::*;

  const KEY: CacheKey = CacheKey::Collection(Table::Branches);

  fn cache() -> QueryCache { QueryCache::new(Duration::from_secs(60)) }

  #[test]
  fn keys_display_table_and_id() {
    let id = Uuid::nil();
    assert_eq!(KEY.to_string(), "collection:branches");
    assert_eq!(
      CacheKey::Entity(Table::Users, id).to_string(),
      format!("entity:users:{id}")
    );
  }

  #[tokio::test]
  async fn fresh_value_is_served_without_refetch() {
    let cache = cache();
    let calls = AtomicUsize::new(0);
    let calls = &calls;

    for _ in 0..3 {
      let value: Vec<u32> = cache
        .fetch(KEY, move || async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(vec![1, 2])
        })
        .await
        .unwrap();
      assert_eq!(value, vec![1, 2]);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.status(KEY), Some(Status::Fresh));
  }

  #[tokio::test]
  async fn concurrent_reads_share_one_request() {
    let cache = cache();
    let calls = AtomicUsize::new(0);
    let calls = &calls;
    let read = || {
      cache.fetch(KEY, move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_millis(20)).await;
        Ok(7_u32)
      })
    };

    let (a, b, c) = tokio::join!(read(), read(), read());
    assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (7, 7, 7));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn invalidation_forces_refetch() {
    let cache = cache();
    let _: u32 = cache.fetch(KEY, || async { Ok(1) }).await.unwrap();
    cache.invalidate(KEY);
    assert_eq!(cache.status(KEY), Some(Status::Stale));

    let value: u32 = cache.fetch(KEY, || async { Ok(2) }).await.unwrap();
    assert_eq!(value, 2);
  }

  #[tokio::test]
  async fn failure_keeps_previous_value_readable() {
    let cache = cache();
    let _: u32 = cache.fetch(KEY, || async { Ok(1) }).await.unwrap();
    cache.invalidate(KEY);

    let result: Result<u32> = cache
      .fetch(KEY, || async { Err(Error::repository(Message("down".into()))) })
      .await;
    assert!(matches!(result, Err(Error::Repository(_))));
    assert_eq!(cache.status(KEY), Some(Status::Stale));
    assert_eq!(cache.peek::<u32>(KEY), Some(1));
  }

  #[tokio::test]
  async fn response_from_before_invalidation_is_not_stored() {
    let cache = cache();

    let slow = cache.fetch(KEY, || async {
      sleep(Duration::from_millis(50)).await;
      Ok(1_u32)
    });
    let write_then_read = async {
      sleep(Duration::from_millis(10)).await;
      cache.invalidate(KEY);
      cache.fetch(KEY, || async { Ok(2_u32) }).await
    };

    let (old, new) = tokio::join!(slow, write_then_read);
    assert_eq!(old.unwrap(), 1);
    assert_eq!(new.unwrap(), 2);
    assert_eq!(cache.peek::<u32>(KEY), Some(2));
    assert_eq!(cache.status(KEY), Some(Status::Fresh));
  }

  #[tokio::test]
  async fn zero_stale_time_always_refetches() {
    let cache = QueryCache::new(Duration::ZERO);
    let _: u32 = cache.fetch(KEY, || async { Ok(1) }).await.unwrap();
    let value: u32 = cache.fetch(KEY, || async { Ok(2) }).await.unwrap();
    assert_eq!(value, 2);
  }

  #[tokio::test]
  async fn abandoned_fetch_releases_the_slot() {
    let cache = cache();
    let abandoned = tokio::time::timeout(
      Duration::from_millis(5),
      cache.fetch(KEY, || async {
        sleep(Duration::from_secs(5)).await;
        Ok(1_u32)
      }),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(cache.status(KEY), Some(Status::Stale));

    let value: u32 = cache.fetch(KEY, || async { Ok(3) }).await.unwrap();
    assert_eq!(value, 3);
  }

  #[tokio::test]
  async fn clear_drops_everything() {
    let cache = cache();
    let _: u32 = cache.fetch(KEY, || async { Ok(1) }).await.unwrap();
    cache.clear();
    assert_eq!(cache.status(KEY), None);
    assert_eq!(cache.peek::<u32>(KEY), None);
  }

  #[tokio::test]
  async fn type_mismatch_is_an_error() {
    let cache = cache();
    let _: u32 = cache.fetch(KEY, || async { Ok(1) }).await.unwrap();
    let wrong: Result<String> =
      cache.fetch(KEY, || async { Ok(String::new()) }).await;
    assert!(wrong.is_err());
  }
}
