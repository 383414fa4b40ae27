//! Keyed request collapsing.
//!
//! The first caller for a key becomes the leader: its work runs in a spawned
//! task and every caller that arrives while it is in flight awaits the same
//! outcome. The work is detached from the leader, so an abandoned caller
//! never cancels it.

use std::{
  collections::HashMap,
  future::Future,
  hash::Hash,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;
use tokio::sync::watch;

/// The in-flight task ended without producing a value (it panicked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("in-flight work aborted before completing")]
pub struct Aborted;

type InFlight<K, V> = Arc<Mutex<HashMap<K, watch::Receiver<Option<V>>>>>;

pub struct SingleFlight<K, V> {
  in_flight: InFlight<K, V>,
}

impl<K, V> Clone for SingleFlight<K, V> {
  fn clone(&self) -> Self {
    Self { in_flight: Arc::clone(&self.in_flight) }
  }
}

impl<K, V> Default for SingleFlight<K, V> {
  fn default() -> Self {
    Self { in_flight: Arc::new(Mutex::new(HashMap::new())) }
  }
}

fn lock<K, V>(
  map: &Mutex<HashMap<K, watch::Receiver<Option<V>>>>,
) -> MutexGuard<'_, HashMap<K, watch::Receiver<Option<V>>>> {
  map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the key once the spawned task is done with it, on unwind too.
struct Landing<K: Eq + Hash, V> {
  key:       K,
  in_flight: InFlight<K, V>,
}

impl<K: Eq + Hash, V> Drop for Landing<K, V> {
  fn drop(&mut self) {
    lock(&self.in_flight).remove(&self.key);
  }
}

impl<K, V> SingleFlight<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  pub fn new() -> Self { Self::default() }

  /// Run `work` for `key` unless a run for `key` is already in flight, in
  /// which case wait for that run instead. `work` is only called by the
  /// leader.
  pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<V, Aborted>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = V> + Send + 'static,
  {
    let mut rx = {
      let mut map = lock(&self.in_flight);
      match map.get(&key) {
        Some(rx) => rx.clone(),
        None => {
          let (tx, rx) = watch::channel(None);
          map.insert(key.clone(), rx.clone());
          drop(map);

          let landing = Landing {
            key,
            in_flight: Arc::clone(&self.in_flight),
          };
          let fut = work();
          tokio::spawn(async move {
            let value = fut.await;
            tx.send_replace(Some(value));
            drop(landing);
          });
          rx
        }
      }
    };

    let value = rx.wait_for(Option::is_some).await.map_err(|_| Aborted)?;
    value.clone().ok_or(Aborted)
  }

  /// Number of keys with work currently in flight.
  pub fn in_flight(&self) -> usize { lock(&self.in_flight).len() }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
  };

  use super::*;

  #[tokio::test]
  async fn concurrent_callers_share_one_run() {
    let flight: SingleFlight<&'static str, u32> = SingleFlight::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
      let flight = flight.clone();
      let calls = Arc::clone(&calls);
      handles.push(tokio::spawn(async move {
        flight
          .run("key", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            42
          })
          .await
      }));
    }

    for handle in handles {
      assert_eq!(handle.await.unwrap(), Ok(42));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(flight.in_flight(), 0);
  }

  #[tokio::test]
  async fn distinct_keys_run_independently() {
    let flight: SingleFlight<u32, u32> = SingleFlight::new();
    let (a, b) = tokio::join!(
      flight.run(1, || async { 10 }),
      flight.run(2, || async { 20 }),
    );
    assert_eq!((a, b), (Ok(10), Ok(20)));
  }

  #[tokio::test]
  async fn a_finished_key_runs_again() {
    let flight: SingleFlight<u32, usize> = SingleFlight::new();
    let calls = Arc::new(AtomicUsize::new(0));
    for expected in 1..=2 {
      let calls = Arc::clone(&calls);
      let seen = flight
        .run(7, move || async move { calls.fetch_add(1, Ordering::SeqCst) + 1 })
        .await;
      assert_eq!(seen, Ok(expected));
    }
  }

  #[tokio::test]
  async fn abandoned_leader_does_not_cancel_the_work() {
    let flight: SingleFlight<u32, u32> = SingleFlight::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let leader = {
      let flight = flight.clone();
      let calls = Arc::clone(&calls);
      tokio::spawn(async move {
        flight
          .run(1, move || async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            calls.fetch_add(1, Ordering::SeqCst);
            5
          })
          .await
      })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    leader.abort();

    let joined = flight.run(1, || async { 99 }).await;
    assert_eq!(joined, Ok(5));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn a_panicking_run_aborts_its_joiners_and_clears_the_key() {
    let flight: SingleFlight<u32, u32> = SingleFlight::new();
    let outcome = flight
      .run(1, || async {
        if true {
          panic!("boom");
        }
        0
      })
      .await;
    assert_eq!(outcome, Err(Aborted));
    assert_eq!(flight.in_flight(), 0);
    assert_eq!(flight.run(1, || async { 3 }).await, Ok(3));
  }
}
