//! Listener actions: type-erased async callables with reference identity.
//!
//! An action receives a [`Context`] and resolves to an [`ActionResult`]:
//!
//! - `Ok(Flow::Continue(()))`: carry on with the next listener.
//! - `Ok(Flow::Break(()))`: stop the dispatch queue here (short-circuit).
//! - `Err(error)`: the listener failed; see [`Mode`](crate::emitter::Mode).
//!
//! Closures have no identity of their own, so registration wraps them in an [`Action`]
//! handle. Two handles compare equal only when they wrap the same allocation, which is
//! what [`Registry::unbind`](crate::registry::Registry::unbind) relies on.

use std::fmt;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;

/// Error type returned by failing actions.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// Whether the dispatch queue should continue after an action.
pub type Flow = ControlFlow<()>;

pub type ActionResult = Result<Flow, ActionError>;

/// Boxed future produced by an action invocation.
pub type ActionFuture = Pin<Box<dyn Future<Output = ActionResult> + Send>>;

/// Synchronous hook invoked around each listener.
pub type Hook<A> = Arc<dyn Fn(&Context<A>) + Send + Sync + 'static>;

/// Conversion trait for async listener functions.
///
/// Any `Fn(Context<A>) -> impl Future<Output = ActionResult> + Send` that is also
/// `Send + Sync + 'static` implements this trait through the blanket impl below.
pub trait IntoAction<A>: Send + Sync + 'static {
    /// Call the action with the given context, boxing the returned future.
    fn call(&self, ctx: Context<A>) -> ActionFuture;
}

impl<A, T, F> IntoAction<A> for T
where
    T: Fn(Context<A>) -> F + Send + Sync + 'static,
    F: Future<Output = ActionResult> + Send + 'static,
{
    fn call(&self, ctx: Context<A>) -> ActionFuture {
        Box::pin((self)(ctx))
    }
}

/// A shareable handle to a registered action.
///
/// # Examples
///
/// ```
/// use eventroute::action::{Action, Flow};
///
/// let a: Action<()> = Action::new(|_ctx| async { Ok(Flow::Continue(())) });
/// let b = a.clone();
/// let c: Action<()> = Action::new(|_ctx| async { Ok(Flow::Continue(())) });
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// ```
pub struct Action<A> {
    inner: Arc<dyn IntoAction<A>>,
}

impl<A: 'static> Action<A> {
    pub fn new(action: impl IntoAction<A>) -> Self {
        Self {
            inner: Arc::new(action),
        }
    }

    pub(crate) fn call(&self, ctx: Context<A>) -> ActionFuture {
        self.inner.call(ctx)
    }
}

impl<A> Clone for Action<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> PartialEq for Action<A> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<A> Eq for Action<A> {}

impl<A> fmt::Debug for Action<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Action")
            .field(&Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}
