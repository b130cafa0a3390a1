//! Configuration: build an [`Emitter`] from declarative `(event, action, priority)` bindings.
//!
//! Actions are code, so a configuration file names them and the application supplies an
//! [`ActionTable`] mapping those names to [`Action`] handles:
//!
//! ```json
//! {
//!   "mode": "fail-fast",
//!   "bindings": [
//!     { "event": "say/:name/hello", "action": "greet", "priority": 10 },
//!     { "event": "^say-(.+)$", "regex": true, "action": "shout" }
//!   ]
//! }
//! ```
//!
//! Every binding is validated while loading: an unknown action name or a malformed pattern
//! fails [`Emitter::from_config`] instead of surfacing at the first emission.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::{Action, IntoAction};
use crate::emitter::{Emitter, Mode};
use crate::pattern::{PatternError, PatternSpec};

/// Errors produced while loading an emitter configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binding for `{event}` names unknown action `{name}`")]
    UnknownAction { event: String, name: String },

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// One `(event, action, priority)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Pattern string, or regex source when `regex` is set.
    pub event: String,
    /// Name of the action in the [`ActionTable`].
    pub action: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub regex: bool,
}

impl BindingConfig {
    /// The pattern spec described by this binding.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidRegex`] for a regex binding whose source does not
    /// compile.
    pub fn spec(&self) -> Result<PatternSpec, PatternError> {
        if self.regex {
            PatternSpec::regex(&self.event)
        } else {
            Ok(PatternSpec::Text(self.event.clone()))
        }
    }
}

/// Declarative emitter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    pub mode: Mode,
    pub bindings: Vec<BindingConfig>,
}

impl EmitterConfig {
    /// Parse a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] when `json` is not a valid configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Named actions that configuration bindings refer to.
pub struct ActionTable<A> {
    actions: HashMap<String, Action<A>>,
}

impl<A: 'static> Default for ActionTable<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> ActionTable<A> {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Add `action` under `name`, replacing any previous entry, and return its handle.
    pub fn insert(&mut self, name: impl Into<String>, action: impl IntoAction<A>) -> Action<A> {
        let action = Action::new(action);
        self.actions.insert(name.into(), action.clone());
        action
    }

    pub fn insert_action(&mut self, name: impl Into<String>, action: Action<A>) {
        self.actions.insert(name.into(), action);
    }

    pub fn get(&self, name: &str) -> Option<&Action<A>> {
        self.actions.get(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl<A: Send + Sync + 'static> Emitter<A> {
    /// Build an emitter from `config`, resolving action names through `actions`.
    ///
    /// Bindings are registered in the order they appear.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownAction`] when a binding names an action missing from `actions`.
    /// - [`ConfigError::Pattern`] when a binding's pattern fails to compile.
    pub fn from_config(config: &EmitterConfig, actions: &ActionTable<A>) -> Result<Self, ConfigError> {
        let emitter = Emitter::new().with_mode(config.mode);

        for binding in &config.bindings {
            let action = actions
                .get(&binding.action)
                .ok_or_else(|| ConfigError::UnknownAction {
                    event: binding.event.clone(),
                    name: binding.action.clone(),
                })?;
            emitter.on_action(binding.spec()?, action.clone(), binding.priority)?;
        }

        Ok(emitter)
    }
}
