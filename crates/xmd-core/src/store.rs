//! Named-variable scope (§4.1).
//!
//! A `Store` maps identifier to [`Value`]. It supports `snapshot` /
//! `restore` for the loop-iteration isolation described in §3's
//! "Directive state" invariants and §4.3's evaluation rules for `for`.

use std::collections::{HashMap, HashSet};

use crate::value::Value;

/// An opaque, deep-copied capture of a store's contents, produced by
/// [`Store::snapshot`] and consumed by [`Store::restore`].
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: Vec<(String, Value)>,
}

#[derive(Debug, Clone, Default)]
pub struct Store {
    vars: HashMap<String, Value>,
}

impl Store {
    pub fn new() -> Self {
        Store {
            vars: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Freshly allocated list of keys; order is not semantically
    /// significant but is stable within a single run.
    pub fn keys(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Deep-copy every entry whose key is not `exclude`, for later
    /// `restore`. Excluding the loop variable here is what makes
    /// `restore` implicitly remove it (§3 invariant 2 / §4.3 for-in
    /// rule): since `restore` replaces the store's entire contents with
    /// the snapshot, a key absent from the snapshot is absent after
    /// restoration even if it was rebound during the loop body.
    pub fn snapshot(&self, exclude: Option<&str>) -> Snapshot {
        let entries = self
            .vars
            .iter()
            .filter(|(k, _)| Some(k.as_str()) != exclude)
            .map(|(k, v)| (k.clone(), v.deep_copy()))
            .collect();
        Snapshot { entries }
    }

    /// Atomically replace the store's contents with a previously taken
    /// snapshot.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.vars.clear();
        for (k, v) in snapshot.entries {
            self.vars.insert(k, v);
        }
    }

    /// Remove every key not in `keep`, leaving the values of the keys
    /// that remain untouched.
    ///
    /// This is the native `for`-loop's per-iteration isolation (§4.3,
    /// §9): call [`Store::keys`] before binding the loop variable, run
    /// the body, then `prune_except` that key set. Unlike `restore`,
    /// this never reverts a *value*, so assignments to pre-existing
    /// variables made inside the loop body survive past the iteration —
    /// only the loop variable and any names introduced inside the body
    /// are discarded.
    pub fn prune_except(&mut self, keep: &HashSet<String>) {
        self.vars.retain(|k, _| keep.contains(k));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_remove() {
        let mut store = Store::new();
        assert_eq!(store.get("x"), None);
        store.set("x", Value::Number(1.0));
        assert_eq!(store.get("x"), Some(Value::Number(1.0)));
        store.remove("x");
        assert_eq!(store.get("x"), None);
    }

    #[test]
    fn snapshot_restore_excludes_loop_variable() {
        let mut store = Store::new();
        store.set("outer", Value::Number(1.0));
        let snap = store.snapshot(Some("item"));

        store.set("item", Value::Number(99.0));
        store.set("outer", Value::Number(2.0));
        store.set("new_var", Value::Number(3.0));

        store.restore(snap);

        assert_eq!(store.get("outer"), Some(Value::Number(1.0)));
        assert_eq!(store.get("item"), None);
        assert_eq!(store.get("new_var"), None);
    }

    #[test]
    fn restore_fully_reverts_mutations_except_excluded_key() {
        // This is the legacy-processor's single pre-loop/post-loop
        // snapshot (§4.4): a snapshot taken once, restored once, after
        // the loop variable stops mattering. Per-iteration isolation for
        // the native `for` loop is handled by the evaluator, not here —
        // see xmd-engine's `for_loop_iteration_isolation` tests and
        // DESIGN.md's note on the §4.3/S6 resolution.
        let mut store = Store::new();
        store.set("a", Value::Number(1.0));
        let snap = store.snapshot(Some("a"));

        store.set("a", Value::Number(42.0));
        store.set("b", Value::Number(2.0));

        store.restore(snap);

        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn prune_except_keeps_values_of_surviving_keys() {
        // Mirrors the native for-loop's per-iteration isolation: `s`
        // pre-exists and accumulates across iterations (S6), while the
        // loop variable `n` and a loop-local `tmp` don't survive.
        let mut store = Store::new();
        store.set("s", Value::String(String::new()));
        let keep: HashSet<String> = store.keys().into_iter().collect();

        store.set("n", Value::Number(1.0));
        store.set("tmp", Value::Number(1.0));
        store.set("s", Value::String("1".to_string()));
        store.prune_except(&keep);

        assert_eq!(store.get("s"), Some(Value::String("1".to_string())));
        assert_eq!(store.get("n"), None);
        assert_eq!(store.get("tmp"), None);
    }
}
