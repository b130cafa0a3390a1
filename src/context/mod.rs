//! Per-listener context: captured parameters, call arguments and shared dispatch state.
//!
//! Every listener invoked by [`Emitter::emit`](crate::emitter::Emitter::emit) receives its
//! own [`Context`]. Contexts built for the same `emit` call share:
//!
//! - the call arguments (behind an [`Arc`], never copied per listener), and
//! - one type-keyed [`Extensions`] map, so a later listener can observe what an earlier
//!   one produced (for example a fallback that only acts when nothing responded yet).

use std::{
    any::{Any, TypeId},
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use parking_lot::Mutex;

use crate::pattern::{Match, Pattern};

/// Type-keyed state shared by every listener of a single dispatch.
///
/// At most one value per type is stored; inserting a second value of the same type
/// replaces the first and returns it.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning the previous value of the same type if there was one.
    pub fn insert<T>(&mut self, value: T) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
            .map(|previous| *previous)
    }

    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T>(&mut self) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn contains<T>(&self) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Values captured from an event name by a matching pattern.
///
/// Named captures (`:name` segments, named regex groups) are addressed by name; positional
/// captures (`*`/`**` segments, numbered regex groups) by index.
///
/// # Examples
///
/// ```
/// use eventroute::context::Parameters;
///
/// let mut params = Parameters::new();
/// params.insert("name", "john");
/// params.insert_index(0, "jane");
/// assert_eq!(params.get("name"), Some("john"));
/// assert_eq!(params.index(0), Some("jane"));
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    named: HashMap<String, String>,
    positional: BTreeMap<usize, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.named.insert(name.into(), value.into());
    }

    pub fn insert_index(&mut self, index: usize, value: impl Into<String>) {
        self.positional.insert(index, value.into());
    }

    /// Value captured under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Value captured at position `index`.
    pub fn index(&self, index: usize) -> Option<&str> {
        self.positional.get(&index).map(String::as_str)
    }

    pub fn named(&self) -> impl Iterator<Item = (&str, &str)> {
        self.named.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Positional captures in index order.
    pub fn positional(&self) -> impl Iterator<Item = (usize, &str)> {
        self.positional.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Total number of captures, named and positional.
    pub fn len(&self) -> usize {
        self.named.len() + self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.positional.is_empty()
    }
}

/// Everything a listener sees about the dispatch it is part of.
///
/// Cloning a `Context` is cheap: all fields are reference-counted.
pub struct Context<A> {
    matched: Arc<Match>,
    args: Arc<A>,
    state: Arc<Mutex<Extensions>>,
    index: usize,
    priority: i32,
}

impl<A> Clone for Context<A> {
    fn clone(&self) -> Self {
        Self {
            matched: Arc::clone(&self.matched),
            args: Arc::clone(&self.args),
            state: Arc::clone(&self.state),
            index: self.index,
            priority: self.priority,
        }
    }
}

impl<A> Context<A> {
    pub(crate) fn new(
        matched: Arc<Match>,
        args: Arc<A>,
        state: Arc<Mutex<Extensions>>,
        index: usize,
        priority: i32,
    ) -> Self {
        Self {
            matched,
            args,
            state,
            index,
            priority,
        }
    }

    /// The concrete event name being dispatched.
    pub fn event(&self) -> &str {
        self.matched.event()
    }

    /// The pattern this listener was registered under.
    pub fn pattern(&self) -> &Pattern {
        self.matched.pattern()
    }

    pub fn params(&self) -> &Parameters {
        self.matched.params()
    }

    /// Shorthand for `self.params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.matched.params().get(name)
    }

    pub fn args(&self) -> &A {
        &self.args
    }

    /// Shared handle to the arguments, for actions that move them into spawned work.
    pub fn args_arc(&self) -> Arc<A> {
        Arc::clone(&self.args)
    }

    /// State shared with every other listener of this dispatch.
    pub fn state(&self) -> &Mutex<Extensions> {
        &self.state
    }

    /// Position of this listener in the dispatch queue.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}
