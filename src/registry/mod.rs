//! Listener registry: the pattern → listeners mapping behind every emitter.
//!
//! Each distinct [`PatternSpec`] is compiled once and owns an insertion-ordered list of
//! [`Listener`]s. Every listener is stamped with a registry-wide sequence number at
//! registration; dispatch orders the union of all matched listeners by
//! `(higher priority first, lower sequence first)`.
//!
//! A pattern disappears from the registry when its last listener is unbound or when it is
//! cleared, so every registered pattern always has at least one listener.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use crate::action::{Action, IntoAction};
use crate::pattern::{Match, Pattern, PatternError, PatternKey, PatternSpec};

/// One `(action, priority)` pair registered under a pattern.
pub struct Listener<A> {
    action: Action<A>,
    priority: i32,
    sequence: u64,
}

impl<A> Clone for Listener<A> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            priority: self.priority,
            sequence: self.sequence,
        }
    }
}

impl<A> std::fmt::Debug for Listener<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("action", &self.action)
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl<A> Listener<A> {
    pub fn action(&self) -> &Action<A> {
        &self.action
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Registry-wide registration order; lower values were registered earlier.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

// A compiled pattern and the listeners registered under it.
struct Route<A> {
    pattern: Arc<Pattern>,
    listeners: Vec<Listener<A>>,
}

impl<A> Clone for Route<A> {
    fn clone(&self) -> Self {
        Self {
            pattern: Arc::clone(&self.pattern),
            listeners: self.listeners.clone(),
        }
    }
}

/// A listener paired with the match of the pattern it was registered under.
pub(crate) struct Entry<A> {
    pub(crate) listener: Listener<A>,
    pub(crate) matched: Arc<Match>,
}

/// Stores patterns and their listeners.
///
/// # Examples
///
/// ```
/// use eventroute::{Flow, Registry};
///
/// let mut registry: Registry<()> = Registry::new();
/// registry.on("say/:name", |_ctx| async { Ok(Flow::Continue(())) }, 0).unwrap();
/// registry.on("say/*", |_ctx| async { Ok(Flow::Continue(())) }, 10).unwrap();
///
/// let matches = registry.matches("say/john");
/// assert_eq!(matches.len(), 2);
/// assert_eq!(matches[0].params().get("name"), Some("john"));
/// assert_eq!(matches[1].params().index(0), Some("john"));
/// ```
pub struct Registry<A> {
    routes: Vec<Route<A>>,
    index: HashMap<PatternKey, usize>,
    sequence: u64,
}

impl<A> Clone for Registry<A> {
    fn clone(&self) -> Self {
        Self {
            routes: self.routes.clone(),
            index: self.index.clone(),
            sequence: self.sequence,
        }
    }
}

impl<A: Send + Sync + 'static> Default for Registry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Send + Sync + 'static> Registry<A> {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            index: HashMap::new(),
            sequence: 0,
        }
    }

    /// Register `action` under `spec` with the given priority.
    ///
    /// Returns the [`Action`] handle that was stored, for a later [`unbind`](Self::unbind).
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when `spec` is a new spec that fails to compile.
    pub fn on(
        &mut self,
        spec: impl Into<PatternSpec>,
        action: impl IntoAction<A>,
        priority: i32,
    ) -> Result<Action<A>, PatternError> {
        let action = Action::new(action);
        self.on_action(spec, action.clone(), priority)?;
        Ok(action)
    }

    /// Register an existing [`Action`] handle under `spec`.
    ///
    /// Registering the same handle twice stores two independent listeners.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when `spec` is a new spec that fails to compile.
    pub fn on_action(
        &mut self,
        spec: impl Into<PatternSpec>,
        action: Action<A>,
        priority: i32,
    ) -> Result<(), PatternError> {
        let spec = spec.into();
        let at = match self.index.get(&spec.key()) {
            Some(&at) => at,
            None => self.insert_route(Arc::new(Pattern::compile(spec)?)),
        };
        self.push(at, action, priority);
        Ok(())
    }

    /// Remove the first listener under `spec` whose action is `action`.
    ///
    /// Returns `false` when the spec was never registered or holds no such action.
    pub fn unbind(&mut self, spec: impl Into<PatternSpec>, action: &Action<A>) -> bool {
        let Some(&at) = self.index.get(&spec.into().key()) else {
            return false;
        };
        let listeners = &mut self.routes[at].listeners;
        let Some(position) = listeners.iter().position(|l| &l.action == action) else {
            return false;
        };
        listeners.remove(position);
        if listeners.is_empty() {
            self.remove_route(at);
        }
        true
    }

    /// Remove every listener under `spec`. Returns how many were removed.
    pub fn clear(&mut self, spec: impl Into<PatternSpec>) -> usize {
        match self.index.get(&spec.into().key()) {
            Some(&at) => self.remove_route(at).listeners.len(),
            None => 0,
        }
    }

    /// Test `event` against every registered pattern, in pattern registration order.
    pub fn matches(&self, event: &str) -> Vec<Match> {
        self.routes
            .iter()
            .filter_map(|route| {
                route
                    .pattern
                    .test(event)
                    .map(|params| Match::new(Arc::clone(&route.pattern), event, params))
            })
            .collect()
    }

    // Build the priority-sorted dispatch queue for `event`, returning it with the number of
    // patterns that matched.
    pub(crate) fn queue(&self, event: &str) -> (usize, Vec<Entry<A>>) {
        let mut matched = 0;
        let mut queue = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.test(event) else {
                continue;
            };
            matched += 1;
            let shared = Arc::new(Match::new(Arc::clone(&route.pattern), event, params));
            queue.extend(route.listeners.iter().map(|listener| Entry {
                listener: listener.clone(),
                matched: Arc::clone(&shared),
            }));
        }

        queue.sort_by_key(|entry| (Reverse(entry.listener.priority), entry.listener.sequence));
        (matched, queue)
    }

    /// Copy of the current pattern → listeners mapping.
    pub fn listeners(&self) -> Snapshot<A> {
        Snapshot {
            entries: self
                .routes
                .iter()
                .map(|route| (Arc::clone(&route.pattern), route.listeners.clone()))
                .collect(),
        }
    }

    /// Re-register every listener of `other` here, keeping priorities and relative order.
    pub fn merge(&mut self, other: &Registry<A>) {
        let mut incoming: Vec<(&Arc<Pattern>, &Listener<A>)> = other
            .routes
            .iter()
            .flat_map(|route| route.listeners.iter().map(move |l| (&route.pattern, l)))
            .collect();
        incoming.sort_by_key(|(_, listener)| listener.sequence);

        for (pattern, listener) in incoming {
            let at = match self.index.get(&pattern.key()) {
                Some(&at) => at,
                None => self.insert_route(Arc::clone(pattern)),
            };
            self.push(at, listener.action.clone(), listener.priority);
        }
    }

    /// Number of registered listeners across all patterns.
    pub fn len(&self) -> usize {
        self.routes.iter().map(|route| route.listeners.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn pattern_count(&self) -> usize {
        self.routes.len()
    }

    fn insert_route(&mut self, pattern: Arc<Pattern>) -> usize {
        let at = self.routes.len();
        self.index.insert(pattern.key(), at);
        self.routes.push(Route {
            pattern,
            listeners: Vec::new(),
        });
        at
    }

    fn push(&mut self, at: usize, action: Action<A>, priority: i32) {
        self.sequence += 1;
        self.routes[at].listeners.push(Listener {
            action,
            priority,
            sequence: self.sequence,
        });
    }

    // Drop a route and shift the index of every route registered after it.
    fn remove_route(&mut self, at: usize) -> Route<A> {
        let route = self.routes.remove(at);
        self.index.remove(&route.pattern.key());
        for slot in self.index.values_mut() {
            if *slot > at {
                *slot -= 1;
            }
        }
        route
    }
}

/// Read-only copy of a registry's pattern → listeners mapping.
///
/// Taken by [`Registry::listeners`]; later changes to the registry are not reflected here.
pub struct Snapshot<A> {
    entries: Vec<(Arc<Pattern>, Vec<Listener<A>>)>,
}

impl<A> Snapshot<A> {
    /// Patterns and their listeners, in pattern registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Pattern, &[Listener<A>])> {
        self.entries
            .iter()
            .map(|(pattern, listeners)| (pattern.as_ref(), listeners.as_slice()))
    }

    /// Listeners registered under `spec`, if it is registered.
    pub fn get(&self, spec: impl Into<PatternSpec>) -> Option<&[Listener<A>]> {
        let key = spec.into().key();
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.key() == key)
            .map(|(_, listeners)| listeners.as_slice())
    }

    pub fn pattern_count(&self) -> usize {
        self.entries.len()
    }

    pub fn listener_count(&self) -> usize {
        self.entries.iter().map(|(_, listeners)| listeners.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Flow;
    use regex::Regex;

    fn noop() -> Action<()> {
        Action::new(|_ctx| async { Ok(Flow::Continue(())) })
    }

    #[test]
    fn registry_starts_empty() {
        let registry: Registry<()> = Registry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.pattern_count(), 0);
    }

    #[test]
    fn same_spec_shares_one_pattern() {
        let mut registry = Registry::new();
        registry.on_action("a/:x", noop(), 0).unwrap();
        registry.on_action("a/:x", noop(), 5).unwrap();
        assert_eq!(registry.pattern_count(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_action_registers_twice() {
        let mut registry = Registry::new();
        let action = noop();
        registry.on_action("evt", action.clone(), 0).unwrap();
        registry.on_action("evt", action.clone(), 0).unwrap();
        assert_eq!(registry.len(), 2);

        assert!(registry.unbind("evt", &action));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn invalid_spec_is_rejected_at_registration() {
        let mut registry: Registry<()> = Registry::new();
        let result = registry.on("", |_ctx| async { Ok(Flow::Continue(())) }, 0);
        assert!(matches!(result, Err(PatternError::Empty)));
        assert!(registry.is_empty());
    }

    #[test]
    fn unbind_unknown_spec_or_action_returns_false() {
        let mut registry = Registry::new();
        registry.on_action("evt", noop(), 0).unwrap();
        assert!(!registry.unbind("other", &noop()));
        assert!(!registry.unbind("evt", &noop()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unbinding_last_listener_drops_pattern() {
        let mut registry = Registry::new();
        let action = noop();
        registry.on_action("a", action.clone(), 0).unwrap();
        registry.on_action("b", noop(), 0).unwrap();
        assert!(registry.unbind("a", &action));
        assert_eq!(registry.pattern_count(), 1);
        // "b" must still be reachable after the index shift.
        registry.on_action("b", noop(), 0).unwrap();
        assert_eq!(registry.pattern_count(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn clear_removes_all_listeners_of_spec() {
        let mut registry = Registry::new();
        registry.on_action("a", noop(), 0).unwrap();
        registry.on_action("a", noop(), 0).unwrap();
        registry.on_action("b", noop(), 0).unwrap();
        assert_eq!(registry.clear("a"), 2);
        assert_eq!(registry.clear("a"), 0);
        assert_eq!(registry.clear("never"), 0);
        assert_eq!(registry.len(), 1);
        assert!(registry.matches("a").is_empty());
        assert_eq!(registry.matches("b").len(), 1);
    }

    #[test]
    fn regex_and_text_specs_are_distinct() {
        let mut registry = Registry::new();
        registry.on_action("say", noop(), 0).unwrap();
        registry.on_action(Regex::new("say").unwrap(), noop(), 0).unwrap();
        assert_eq!(registry.pattern_count(), 2);
        assert_eq!(registry.clear(Regex::new("say").unwrap()), 1);
        assert_eq!(registry.pattern_count(), 1);
    }

    #[test]
    fn matches_follow_pattern_registration_order() {
        let mut registry = Registry::new();
        registry.on_action("say/*/hello", noop(), 0).unwrap();
        registry.on_action("say/:name/hello", noop(), 100).unwrap();
        registry.on_action(Regex::new(r"^say-(.+)$").unwrap(), noop(), 0).unwrap();

        let matches = registry.matches("say/john/hello");
        let raws: Vec<_> = matches.iter().map(|m| m.pattern().raw()).collect();
        assert_eq!(raws, vec!["say/*/hello", "say/:name/hello"]);
        assert!(matches.iter().all(|m| m.event() == "say/john/hello"));
    }

    #[test]
    fn queue_sorts_by_priority_then_registration() {
        let mut registry = Registry::new();
        let low = noop();
        let first = noop();
        let high = noop();
        let second = noop();
        registry.on_action("x/*", low.clone(), -1).unwrap();
        registry.on_action("x/:id", first.clone(), 0).unwrap();
        registry.on_action("x/*", high.clone(), 10).unwrap();
        registry.on_action("x/:id", second.clone(), 0).unwrap();

        let (matched, queue) = registry.queue("x/1");
        assert_eq!(matched, 2);
        let order: Vec<_> = queue.iter().map(|e| e.listener.action().clone()).collect();
        assert_eq!(order, vec![high, first, second, low]);
        assert_eq!(queue[1].matched.params().get("id"), Some("1"));
        assert_eq!(queue[0].matched.params().index(0), Some("1"));
    }

    #[test]
    fn snapshot_is_detached_from_registry() {
        let mut registry = Registry::new();
        registry.on_action("a", noop(), 0).unwrap();
        let snapshot = registry.listeners();
        registry.on_action("a", noop(), 0).unwrap();
        registry.on_action("b", noop(), 0).unwrap();

        assert_eq!(snapshot.listener_count(), 1);
        assert_eq!(snapshot.pattern_count(), 1);
        assert_eq!(registry.listeners().listener_count(), 3);
    }

    #[test]
    fn snapshot_counts_track_on_unbind_and_clear() {
        let mut registry = Registry::new();
        let keep = noop();
        let removed = noop();
        registry.on_action("a", keep.clone(), 1).unwrap();
        registry.on_action("a", removed.clone(), 2).unwrap();
        registry.on_action("b/*", noop(), 0).unwrap();
        registry.on_action("c", noop(), 0).unwrap();
        registry.on_action("c", noop(), 0).unwrap();

        assert!(registry.unbind("a", &removed));
        registry.clear("c");

        let snapshot = registry.listeners();
        assert_eq!(snapshot.listener_count(), 5 - 1 - 2);
        let a = snapshot.get("a").unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].action(), &keep);
        assert_eq!(a[0].priority(), 1);
        assert!(snapshot.get("c").is_none());

        let patterns: Vec<_> = snapshot.iter().map(|(p, _)| p.raw().to_owned()).collect();
        assert_eq!(patterns, vec!["a", "b/*"]);
    }

    #[test]
    fn merge_appends_listeners_with_original_priorities() {
        let mut parent = Registry::new();
        let mut child = Registry::new();
        let parent_action = noop();
        let child_first = noop();
        let child_second = noop();
        parent.on_action("evt", parent_action.clone(), 0).unwrap();
        child.on_action("evt", child_first.clone(), 0).unwrap();
        child.on_action("other/*", noop(), 3).unwrap();
        child.on_action("evt", child_second.clone(), 7).unwrap();

        parent.merge(&child);
        assert_eq!(parent.len(), 4);
        assert_eq!(parent.pattern_count(), 2);
        assert_eq!(child.len(), 3);

        let (_, queue) = parent.queue("evt");
        let order: Vec<_> = queue.iter().map(|e| e.listener.action().clone()).collect();
        assert_eq!(order, vec![child_second, parent_action, child_first]);
    }
}
