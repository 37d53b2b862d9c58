//! Structured command errors.
//!
//! [`CommandError`] is the carrier for the exception pipeline: a stable
//! identifier plus ordered contextual key/value pairs, intended for
//! user-facing translation by an exception sink. The dispatcher raises
//! the built-in access-control ids; handlers may raise arbitrary ids.
//!
//! [`RegistryError`] covers definition mistakes caught at registration
//! time. It is an ordinary `Result` error, never part of the runtime
//! pipeline.
//!
//! # Raising from handlers
//!
//! `CommandError` implements `std::error::Error`, so handlers returning
//! `anyhow::Result<()>` raise it with `?` or `into()`:
//!
//! ```rust
//! use cmdtree::CommandError;
//!
//! fn withdraw(amount: i32, balance: i32) -> anyhow::Result<()> {
//!     if amount > balance {
//!         return Err(CommandError::new("points.insufficient")
//!             .with("amount", amount)
//!             .with("balance", balance)
//!             .into());
//!     }
//!     Ok(())
//! }
//! ```

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

/// Error id raised when the invoker lacks the command's permission.
///
/// Context key: `permission` (the declared permission string).
pub const NO_PERMISSION: &str = "sender.no-permission";

/// Error id raised when a player-only command is invoked by a non-player.
pub const EXECUTOR_PLAYER: &str = "executor-type.player";

/// Error id raised when a console-only command is invoked by a non-console.
pub const EXECUTOR_CONSOLE: &str = "executor-type.console";

/// A structured, recoverable command error.
///
/// Carries a stable id plus an ordered context map. Context entries are
/// appended builder-style via [`with`](CommandError::with) and preserved
/// in insertion order for the exception sink.
#[derive(Debug, Clone, Error)]
#[error("{id}")]
pub struct CommandError {
    id: String,
    context: IndexMap<String, Value>,
}

impl CommandError {
    /// Creates a new error with the given id and empty context.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: IndexMap::new(),
        }
    }

    /// Appends a context entry and returns the error (chainable).
    ///
    /// Re-using a key overwrites the previous value in place.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// The stable error identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The ordered context map.
    pub fn context(&self) -> &IndexMap<String, Value> {
        &self.context
    }

    /// Looks up a single context value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }
}

/// A definition error rejected at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A command or subcommand has an empty name.
    #[error("command name must not be empty")]
    EmptyName,

    /// A greedy text argument is followed by further arguments.
    #[error("greedy argument '{argument}' of '{command}' must be last in its chain")]
    GreedyNotLast {
        /// The owning command or subcommand name.
        command: String,
        /// The offending argument name.
        argument: String,
    },

    /// A required argument is declared after an optional one.
    #[error("required argument '{argument}' of '{command}' follows an optional argument")]
    RequiredAfterOptional {
        /// The owning command or subcommand name.
        command: String,
        /// The offending argument name.
        argument: String,
    },
}
