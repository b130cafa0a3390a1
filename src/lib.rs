//! # eventroute
//!
//! Priority-ordered, pattern-matched async event dispatch.
//!
//! Listeners are registered under event patterns (literal names, `:name` parameters,
//! `*`/`**` wildcards, or regular expressions) with a signed priority. Emitting a concrete
//! event name runs every listener of every matching pattern, highest priority first,
//! strictly one after another.
//!
//! ## Quick Start
//!
//! ```rust
//! use eventroute::{Context, Emitter, Flow};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let emitter: Emitter<()> = Emitter::new();
//!
//!     emitter.on("say/:name/hello", |ctx: Context<()>| async move {
//!         println!("hello from {}", ctx.param("name").unwrap_or("nobody"));
//!         Ok(Flow::Continue(()))
//!     }, 10)?;
//!
//!     emitter.on("say/*/hello", |ctx: Context<()>| async move {
//!         println!("wildcard saw {}", ctx.params().index(0).unwrap_or(""));
//!         Ok(Flow::Continue(()))
//!     }, 0)?;
//!
//!     let status = emitter.emit("say/john/hello", ()).await?;
//!     assert_eq!(status.invoked(), 2);
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod config;
pub mod context;
pub mod emitter;
pub mod pattern;
pub mod registry;
pub mod router;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use action::{Action, ActionError, ActionResult, Flow, IntoAction};
pub use config::{ActionTable, ConfigError, EmitterConfig};
pub use context::{Context, Parameters};
pub use emitter::{DispatchError, Emitter, Mode, Outcome, Status};
pub use pattern::{Match, Pattern, PatternError, PatternKind, PatternSpec};
pub use registry::{Listener, Registry, Snapshot};
pub use router::{Method, Router};
