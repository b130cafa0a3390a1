//! Route events: HTTP method + path dispatch and the bootstrap lifecycle on an [`Emitter`].
//!
//! A route is an ordinary event whose name is `"METHOD /path"`. [`Router::get`] and friends
//! register the pattern `"GET /users/:id"`; [`Router::resolve`] emits `"GET /users/42"`.
//! Every pattern style works inside the path part:
//!
//! | Route pattern          | Example request            | Captured params              |
//! |------------------------|----------------------------|------------------------------|
//! | `GET /users`           | `GET /users`               | *(none)*                     |
//! | `GET /users/:id`       | `GET /users/42`            | `id → "42"`                  |
//! | `GET /files/**`        | `GET /files/docs/a.txt`    | `0 → "docs/a.txt"`           |
//!
//! Trailing slashes are normalized on both patterns and resolved paths, so `/users/` and
//! `/users` are treated as equivalent.
//!
//! Unlike a first-match router, every matching route runs, highest priority first. A route
//! that fully handles the request returns `Flow::Break` to stop lower-priority routes.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::action::{Action, IntoAction};
use crate::emitter::{DispatchError, Emitter, Status};
use crate::pattern::PatternError;

/// Lifecycle events emitted by [`Router::bootstrap`], in order.
pub const LIFECYCLE: [&str; 3] = ["config", "listen", "route"];

/// An HTTP request method.
///
/// # Examples
///
/// ```
/// use eventroute::router::Method;
///
/// let method: Method = "GET".parse().unwrap();
/// assert_eq!(method, Method::Get);
/// assert_eq!(method.as_str(), "GET");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    /// A non-standard extension method, kept verbatim.
    Custom(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "PATCH" => Self::Patch,
            other => Self::Custom(other.to_owned()),
        })
    }
}

/// Event name for `method` on `path`, with any trailing slash (other than on `/`) removed.
///
/// # Examples
///
/// ```
/// use eventroute::router::{Method, route_event};
///
/// assert_eq!(route_event(&Method::Get, "/users/"), "GET /users");
/// assert_eq!(route_event(&Method::Post, "/"), "POST /");
/// ```
pub fn route_event(method: &Method, path: &str) -> String {
    let path = if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    };
    format!("{method} {path}")
}

/// Method + path router layered over an [`Emitter`].
///
/// Route actions receive the router's argument type `A`; in a web application that is
/// typically a request/response pair.
///
/// # Examples
///
/// ```rust
/// use eventroute::{Context, Flow, router::{Method, Router}};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let router: Router<()> = Router::new();
/// router
///     .get("/users/:id", |ctx: Context<()>| async move {
///         assert_eq!(ctx.param("id"), Some("42"));
///         Ok(Flow::Break(()))
///     })
///     .unwrap();
///
/// let status = router.resolve(&Method::Get, "/users/42", ()).await.unwrap();
/// assert!(status.is_short_circuited());
/// # }
/// ```
pub struct Router<A> {
    emitter: Emitter<A>,
}

impl<A: Send + Sync + 'static> Default for Router<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Send + Sync + 'static> Router<A> {
    pub fn new() -> Self {
        Self::from_emitter(Emitter::new())
    }

    pub fn from_emitter(emitter: Emitter<A>) -> Self {
        Self { emitter }
    }

    /// The underlying emitter, for lifecycle and custom events.
    pub fn emitter(&self) -> &Emitter<A> {
        &self.emitter
    }

    pub fn emitter_mut(&mut self) -> &mut Emitter<A> {
        &mut self.emitter
    }

    pub fn into_emitter(self) -> Emitter<A> {
        self.emitter
    }

    /// Register `action` for `method` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the route pattern fails to compile.
    pub fn route(
        &self,
        method: Method,
        path: &str,
        action: impl IntoAction<A>,
        priority: i32,
    ) -> Result<Action<A>, PatternError> {
        self.emitter.on(route_event(&method, path), action, priority)
    }

    /// Register a `GET` route with default priority.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the route pattern fails to compile.
    pub fn get(&self, path: &str, action: impl IntoAction<A>) -> Result<Action<A>, PatternError> {
        self.route(Method::Get, path, action, 0)
    }

    /// Register a `POST` route with default priority.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the route pattern fails to compile.
    pub fn post(&self, path: &str, action: impl IntoAction<A>) -> Result<Action<A>, PatternError> {
        self.route(Method::Post, path, action, 0)
    }

    /// Register a `PUT` route with default priority.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the route pattern fails to compile.
    pub fn put(&self, path: &str, action: impl IntoAction<A>) -> Result<Action<A>, PatternError> {
        self.route(Method::Put, path, action, 0)
    }

    /// Register a `DELETE` route with default priority.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the route pattern fails to compile.
    pub fn delete(&self, path: &str, action: impl IntoAction<A>) -> Result<Action<A>, PatternError> {
        self.route(Method::Delete, path, action, 0)
    }

    /// Register a `PATCH` route with default priority.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the route pattern fails to compile.
    pub fn patch(&self, path: &str, action: impl IntoAction<A>) -> Result<Action<A>, PatternError> {
        self.route(Method::Patch, path, action, 0)
    }

    /// Register an `OPTIONS` route with default priority.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the route pattern fails to compile.
    pub fn options(&self, path: &str, action: impl IntoAction<A>) -> Result<Action<A>, PatternError> {
        self.route(Method::Options, path, action, 0)
    }

    /// Register a `HEAD` route with default priority.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the route pattern fails to compile.
    pub fn head(&self, path: &str, action: impl IntoAction<A>) -> Result<Action<A>, PatternError> {
        self.route(Method::Head, path, action, 0)
    }

    /// Dispatch a `method` request for `path` to every matching route.
    ///
    /// A [`Status`] whose outcome is `NotFound` means no route matched; translating that
    /// (or a [`DispatchError`]) into a response is up to the caller.
    ///
    /// # Errors
    ///
    /// See [`Emitter::emit`].
    pub async fn resolve(&self, method: &Method, path: &str, args: A) -> Result<Status, DispatchError> {
        self.emitter.emit(&route_event(method, path), args).await
    }

    /// Merge every route and listener of `other` into this router.
    pub fn use_router(&self, other: &Router<A>) {
        self.emitter.use_emitter(&other.emitter);
    }

    /// Emit the [`LIFECYCLE`] events in order with shared `args`.
    ///
    /// Stops after the first event whose dispatch short-circuits. Returns the status of
    /// every event that was emitted.
    ///
    /// # Errors
    ///
    /// Returns the first [`DispatchError`]; later lifecycle events are not emitted.
    pub async fn bootstrap(&self, args: A) -> Result<Vec<(&'static str, Status)>, DispatchError> {
        let args = Arc::new(args);
        let mut statuses = Vec::with_capacity(LIFECYCLE.len());

        for event in LIFECYCLE {
            let status = self.emitter.emit_shared(event, Arc::clone(&args)).await?;
            let stop = status.is_short_circuited();
            statuses.push((event, status));
            if stop {
                info!(event, "bootstrap halted");
                return Ok(statuses);
            }
        }

        info!("bootstrap complete");
        Ok(statuses)
    }
}
