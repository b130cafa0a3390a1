//! Event emitter: match, order, and run listeners for a concrete event name.
//!
//! [`Emitter::emit`] snapshots the dispatch queue under a read lock, releases the lock,
//! then runs the queue strictly sequentially:
//!
//! 1. every pattern matching the event contributes all of its listeners;
//! 2. the union is sorted by priority (higher first), ties broken by registration order;
//! 3. for each entry: `before` hook → action (awaited) → `after` hook.
//!
//! Because the lock is not held while listeners run, a listener may register, unbind, or
//! emit on the same emitter. Such changes are seen by the next `emit`, never by the queue
//! already in flight.
//!
//! There is no timeout: a listener that never resolves stalls its `emit` call.

use std::ops::ControlFlow;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::action::{Action, ActionError, Hook, IntoAction};
use crate::context::{Context, Extensions};
use crate::pattern::{Match, PatternError, PatternSpec};
use crate::registry::{Registry, Snapshot};

/// How a failing listener affects the rest of the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Abort the queue and return the failure to the caller.
    #[default]
    FailFast,
    /// Record the failure in [`Status::failures`] and keep going.
    BestEffort,
}

/// How an `emit` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No registered pattern matched the event.
    NotFound,
    /// Every queued listener ran.
    Completed,
    /// A listener returned `Flow::Break`.
    ShortCircuited,
}

/// Summary of one `emit` call.
#[derive(Debug)]
pub struct Status {
    outcome: Outcome,
    matched: usize,
    queued: usize,
    invoked: usize,
    failures: Vec<DispatchError>,
}

impl Status {
    fn not_found() -> Self {
        Self {
            outcome: Outcome::NotFound,
            matched: 0,
            queued: 0,
            invoked: 0,
            failures: Vec::new(),
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Number of patterns that matched the event.
    pub fn matched(&self) -> usize {
        self.matched
    }

    /// Length of the dispatch queue.
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Number of listeners whose action was invoked.
    pub fn invoked(&self) -> usize {
        self.invoked
    }

    /// Failures recorded in [`Mode::BestEffort`]; always empty in fail-fast mode.
    pub fn failures(&self) -> &[DispatchError] {
        &self.failures
    }

    pub fn is_not_found(&self) -> bool {
        self.outcome == Outcome::NotFound
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == Outcome::Completed
    }

    pub fn is_short_circuited(&self) -> bool {
        self.outcome == Outcome::ShortCircuited
    }
}

/// A listener failed while handling an event.
#[derive(Debug, Error)]
#[error("listener {index} on `{pattern}` failed while handling `{event}`: {source}")]
pub struct DispatchError {
    event: String,
    pattern: String,
    index: usize,
    priority: i32,
    #[source]
    source: ActionError,
}

impl DispatchError {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Raw spec of the pattern the failing listener was registered under.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Position of the failing listener in the dispatch queue.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn into_source(self) -> ActionError {
        self.source
    }
}

/// Pattern-matched, priority-ordered async event dispatcher.
///
/// All registration methods take `&self`, so an emitter can be shared behind an [`Arc`]
/// and reached from inside its own listeners.
///
/// # Examples
///
/// ```rust
/// use eventroute::{Context, Emitter, Flow};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let emitter: Emitter<String> = Emitter::new();
/// emitter
///     .on("say/:name/hello", |ctx: Context<String>| async move {
///         println!("{} says {}", ctx.param("name").unwrap_or("?"), ctx.args());
///         Ok(Flow::Continue(()))
///     }, 0)
///     .unwrap();
///
/// let status = emitter.emit("say/john/hello", "hi".to_string()).await.unwrap();
/// assert_eq!(status.invoked(), 1);
/// # }
/// ```
pub struct Emitter<A> {
    registry: RwLock<Registry<A>>,
    before: Option<Hook<A>>,
    after: Option<Hook<A>>,
    mode: Mode,
}

impl<A: Send + Sync + 'static> Default for Emitter<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Send + Sync + 'static> Emitter<A> {
    pub fn new() -> Self {
        Self::from_registry(Registry::new())
    }

    /// Wrap an already-populated registry.
    pub fn from_registry(registry: Registry<A>) -> Self {
        Self {
            registry: RwLock::new(registry),
            before: None,
            after: None,
            mode: Mode::default(),
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Set the hook called with each listener's context right before its action runs.
    pub fn before(&mut self, hook: impl Fn(&Context<A>) + Send + Sync + 'static) {
        self.before = Some(Arc::new(hook));
    }

    /// Set the hook called with each listener's context right after its action resolves,
    /// whether it succeeded or failed.
    pub fn after(&mut self, hook: impl Fn(&Context<A>) + Send + Sync + 'static) {
        self.after = Some(Arc::new(hook));
    }

    /// Register `action` under `spec`; higher `priority` runs earlier.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when `spec` fails to compile.
    pub fn on(
        &self,
        spec: impl Into<PatternSpec>,
        action: impl IntoAction<A>,
        priority: i32,
    ) -> Result<Action<A>, PatternError> {
        let action = Action::new(action);
        self.on_action(spec, action.clone(), priority)?;
        Ok(action)
    }

    /// Register an existing action handle under `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when `spec` fails to compile.
    pub fn on_action(
        &self,
        spec: impl Into<PatternSpec>,
        action: Action<A>,
        priority: i32,
    ) -> Result<(), PatternError> {
        let spec = spec.into();
        let event = display_spec(&spec);
        self.registry.write().on_action(spec, action, priority)?;
        debug!(%event, priority, "registered listener");
        Ok(())
    }

    /// Remove the first listener under `spec` whose action is `action`.
    pub fn unbind(&self, spec: impl Into<PatternSpec>, action: &Action<A>) -> bool {
        let spec = spec.into();
        let removed = self.registry.write().unbind(spec.clone(), action);
        debug!(event = %display_spec(&spec), removed, "unbinding listener");
        removed
    }

    /// Remove every listener under `spec`, returning how many were removed.
    pub fn clear(&self, spec: impl Into<PatternSpec>) -> usize {
        let spec = spec.into();
        let removed = self.registry.write().clear(spec.clone());
        debug!(event = %display_spec(&spec), removed, "clearing listeners");
        removed
    }

    /// Patterns matching `event`, in pattern registration order.
    pub fn matches(&self, event: &str) -> Vec<Match> {
        self.registry.read().matches(event)
    }

    /// Detached copy of the pattern → listeners mapping.
    pub fn listeners(&self) -> Snapshot<A> {
        self.registry.read().listeners()
    }

    /// Merge every listener of `registry` into this emitter.
    pub fn use_registry(&self, registry: &Registry<A>) {
        self.registry.write().merge(registry);
    }

    /// Merge every listener of `other` into this emitter.
    ///
    /// `other` is copied before merging, so `emitter.use_emitter(&emitter)` doubles the
    /// listeners rather than deadlocking.
    pub fn use_emitter(&self, other: &Emitter<A>) {
        let incoming = other.registry.read().clone();
        self.registry.write().merge(&incoming);
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().is_empty()
    }

    /// Dispatch `event` with `args` to every matching listener.
    ///
    /// # Errors
    ///
    /// In [`Mode::FailFast`], returns the first [`DispatchError`]; listeners queued after the
    /// failing one do not run.
    pub async fn emit(&self, event: &str, args: A) -> Result<Status, DispatchError> {
        self.emit_shared(event, Arc::new(args)).await
    }

    /// Like [`emit`](Self::emit), for arguments that are already shared.
    ///
    /// # Errors
    ///
    /// See [`emit`](Self::emit).
    pub async fn emit_shared(&self, event: &str, args: Arc<A>) -> Result<Status, DispatchError> {
        let (matched, queue) = self.registry.read().queue(event);

        if queue.is_empty() {
            debug!(event, "no listeners matched");
            return Ok(Status::not_found());
        }

        debug!(event, matched, listeners = queue.len(), "dispatching event");

        let state = Arc::new(Mutex::new(Extensions::new()));
        let mut status = Status {
            outcome: Outcome::Completed,
            matched,
            queued: queue.len(),
            invoked: 0,
            failures: Vec::new(),
        };

        for (index, entry) in queue.into_iter().enumerate() {
            let priority = entry.listener.priority();
            let ctx = Context::new(
                Arc::clone(&entry.matched),
                Arc::clone(&args),
                Arc::clone(&state),
                index,
                priority,
            );

            if let Some(hook) = &self.before {
                hook(&ctx);
            }

            let start = Instant::now();
            let result = entry.listener.action().call(ctx.clone()).await;
            status.invoked += 1;

            trace!(
                event,
                pattern = %entry.matched.pattern(),
                index,
                priority,
                elapsed = ?start.elapsed(),
                "listener finished"
            );

            if let Some(hook) = &self.after {
                hook(&ctx);
            }

            match result {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => {
                    debug!(event, index, "dispatch short-circuited");
                    status.outcome = Outcome::ShortCircuited;
                    return Ok(status);
                }
                Err(source) => {
                    let error = DispatchError {
                        event: event.to_owned(),
                        pattern: entry.matched.pattern().raw().to_owned(),
                        index,
                        priority,
                        source,
                    };
                    warn!(
                        event,
                        pattern = %error.pattern,
                        index,
                        error = %error.source,
                        "listener failed"
                    );
                    match self.mode {
                        Mode::FailFast => return Err(error),
                        Mode::BestEffort => status.failures.push(error),
                    }
                }
            }
        }

        Ok(status)
    }
}

fn display_spec(spec: &PatternSpec) -> String {
    match spec {
        PatternSpec::Text(raw) => raw.clone(),
        PatternSpec::Regex(re) => format!("/{}/", re.as_str()),
    }
}
