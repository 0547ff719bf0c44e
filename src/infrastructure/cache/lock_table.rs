//! Per-key lock table
//!
//! Maps each active key to an exclusive async lock. Locks are created
//! lazily on first use and removed eagerly once nothing references them,
//! bounding the table to the working set rather than the key universe.
//!
//! Removal is guarded by `Arc::strong_count == 1` inside `remove_if`. The
//! predicate runs under the dashmap shard lock, and cloning an Arc out of
//! the map requires that same shard lock, so a reappearing key can never
//! share a stale lock that another operation is still releasing.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Concurrent key→lock mapping with lazy creation and eager cleanup
#[derive(Debug, Default)]
pub struct KeyLockTable {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the lock for a key, creating it if absent.
    ///
    /// The returned Arc must be handed back through [`release`](Self::release)
    /// once the guard is dropped, or the slot will linger until the next
    /// release for the same key.
    pub fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop a lock reference and remove the slot if nothing else holds it.
    pub fn release(&self, key: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(key, |_, slot| Arc::strong_count(slot) == 1);
    }

    /// Number of keys currently holding a lock slot
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_created_lazily_and_removed_on_release() {
        let table = KeyLockTable::new();
        assert!(table.is_empty());

        let lock = table.lock_for("k1");
        assert_eq!(table.len(), 1);

        {
            let _guard = lock.lock().await;
        }
        table.release("k1", lock);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_slot_survives_while_another_holder_exists() {
        let table = KeyLockTable::new();
        let first = table.lock_for("k1");
        let second = table.lock_for("k1");
        assert!(Arc::ptr_eq(&first, &second));

        table.release("k1", first);
        // second still references the slot, so it must survive
        assert_eq!(table.len(), 1);

        table.release("k1", second);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_same_key_serializes() {
        let table = Arc::new(KeyLockTable::new());
        let counter = Arc::new(std::sync::Mutex::new(0_u32));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let table = Arc::clone(&table);
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let lock = table.lock_for("shared");
                let guard = lock.lock().await;
                {
                    let mut c = counter.lock().unwrap();
                    *c += 1;
                }
                drop(guard);
                table.release("shared", lock);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*counter.lock().unwrap(), 8);
        assert!(table.is_empty());
    }
}
