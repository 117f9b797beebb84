//! Process-wide variable store with kind checking.
//!
//! A variable's kind (number, string, boolean, structured) is fixed by its
//! first assignment; a type-mismatched assignment fails with no partial
//! update. Writers take the lock with a bounded timed retry so a wedged
//! reader cannot hang a script forever.

use caelum_core::{ScriptError, Value};
use caelum_eval::VariableResolver;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

/// The shared variable store.
pub struct VariableStore {
    inner: RwLock<HashMap<String, Value>>,
    lock_retries: u32,
    lock_retry_delay: Duration,
}

impl VariableStore {
    pub fn new(lock_retries: u32, lock_retry_delay: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            lock_retries,
            lock_retry_delay,
        }
    }

    /// Returns the current value of a variable.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.read().get(name).cloned()
    }

    /// Whether a variable exists.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    /// Assigns a variable, enforcing the kind invariant.
    ///
    /// The write lock is taken with a bounded timed retry; exhaustion raises
    /// `LockExhausted` without touching the store.
    pub fn set(&self, name: &str, value: Value) -> Result<(), ScriptError> {
        let mut guard = None;
        for _ in 0..self.lock_retries {
            if let Some(g) = self.inner.try_write_for(self.lock_retry_delay) {
                guard = Some(g);
                break;
            }
        }
        let mut map = guard.ok_or(ScriptError::LockExhausted {
            attempts: self.lock_retries,
        })?;
        if let Some(existing) = map.get(name) {
            if existing.kind() != value.kind() {
                return Err(ScriptError::TypeMismatch {
                    name: name.to_string(),
                    expected: existing.kind(),
                    actual: value.kind(),
                });
            }
        }
        map.insert(name.to_string(), value);
        Ok(())
    }

    /// Inserts a value without the kind check.
    ///
    /// Used by scope frames, closure restoration, and the `__return_value__`
    /// convention, which legitimately rebind names across kinds.
    pub fn insert_raw(&self, name: &str, value: Value) {
        self.inner.write().insert(name.to_string(), value);
    }

    /// Removes a variable, returning its prior value.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.inner.write().remove(name)
    }

    /// Clones the whole store.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.inner.read().clone()
    }

    /// Replaces the whole store with a previously taken snapshot.
    pub fn replace_all(&self, snapshot: HashMap<String, Value>) {
        *self.inner.write() = snapshot;
    }
}

impl VariableResolver for VariableStore {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caelum_core::VariableKind;

    fn store() -> VariableStore {
        VariableStore::new(3, Duration::from_millis(50))
    }

    #[test]
    fn test_set_and_get() {
        let s = store();
        s.set("x", Value::from(5i64)).unwrap();
        assert_eq!(s.get("x"), Some(Value::from(5i64)));
        assert!(s.get("y").is_none());
    }

    #[test]
    fn test_same_kind_reassignment() {
        let s = store();
        s.set("x", Value::from(5i64)).unwrap();
        s.set("x", Value::from(6i64)).unwrap();
        assert_eq!(s.get("x"), Some(Value::from(6i64)));
    }

    #[test]
    fn test_kind_mismatch_leaves_value_unchanged() {
        let s = store();
        s.set("x", Value::from(5i64)).unwrap();
        let err = s.set("x", Value::from("five")).unwrap_err();
        match err {
            ScriptError::TypeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, VariableKind::Number);
                assert_eq!(actual, VariableKind::String);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(s.get("x"), Some(Value::from(5i64)));
    }

    #[test]
    fn test_insert_raw_bypasses_kind_check() {
        let s = store();
        s.set("x", Value::from(5i64)).unwrap();
        s.insert_raw("x", Value::from("now a string"));
        assert_eq!(s.get("x"), Some(Value::from("now a string")));
    }

    #[test]
    fn test_snapshot_restore() {
        let s = store();
        s.set("x", Value::from(1i64)).unwrap();
        let snap = s.snapshot();
        s.set("x", Value::from(2i64)).unwrap();
        s.set("y", Value::from(3i64)).unwrap();
        s.replace_all(snap);
        assert_eq!(s.get("x"), Some(Value::from(1i64)));
        assert!(s.get("y").is_none());
    }

    #[test]
    fn test_lock_exhaustion() {
        let s = VariableStore::new(2, Duration::from_millis(5));
        let _read = s.inner.read();
        // A held read lock makes every timed write attempt fail.
        let err = s.set("x", Value::from(1i64)).unwrap_err();
        assert!(matches!(err, ScriptError::LockExhausted { attempts: 2 }));
    }
}
