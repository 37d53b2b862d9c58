//! Command handler types.
//!
//! This module provides the execution-side surface of the engine: the
//! [`Invoker`] abstraction over the host's notion of "who ran this", the
//! [`ExecContext`] passed to command handlers, and the [`CommandHandler`]
//! trait that command logic implements.
//!
//! # Design Rationale
//!
//! Handlers receive everything they need through [`ExecContext`] and own
//! none of it. In particular, resolved argument values travel in a
//! per-invocation [`BoundArgs`] map rather than being written back onto
//! the command definition, so two invocations of the same definition
//! never share mutable state.
//!
//! Handlers return `anyhow::Result<()>`. A returned
//! [`CommandError`](crate::CommandError) is routed to the exception sink;
//! any other error is treated as unexpected and reported through the
//! dispatcher's best-effort path.

use std::fmt;

use indexmap::IndexMap;

use crate::command::ArgValue;

/// Per-invocation map of resolved argument values, keyed by lowercase
/// argument name in declaration order.
pub type BoundArgs = IndexMap<String, ArgValue>;

/// How the host classifies the entity that issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokerKind {
    /// An in-game player.
    Player,
    /// The host console.
    Console,
}

/// The host's sender abstraction, reduced to what dispatch needs.
///
/// The core never inspects sender identity beyond its display name, its
/// classification, and its permission set.
pub trait Invoker {
    /// Display name for logging and feedback.
    fn name(&self) -> &str;

    /// The invoker's classification, checked against a command's
    /// executor role.
    fn kind(&self) -> InvokerKind;

    /// Whether the invoker holds the given permission string.
    fn has_permission(&self, permission: &str) -> bool;
}

/// Context passed to command handlers for one invocation.
///
/// Both subcommand views are derived from the same resolved path:
/// [`chain`](ExecContext::chain) is the full ordered list of subcommand
/// names traversed from the root, and
/// [`subcommand`](ExecContext::subcommand) is the deepest one alone.
pub struct ExecContext<'a> {
    /// The entity that issued the command.
    pub invoker: &'a dyn Invoker,
    /// The root command name (lowercase).
    pub root: &'a str,
    /// The full ordered subcommand chain from the root; empty when the
    /// root itself was executed.
    pub chain: &'a [String],
    /// Resolved argument values for the executed node.
    pub args: &'a BoundArgs,
    /// Raw tokens following the deepest resolved literal.
    pub raw_tail: &'a [String],
}

impl<'a> ExecContext<'a> {
    /// The deepest executed subcommand, or `None` when the root itself
    /// was executed.
    pub fn subcommand(&self) -> Option<&str> {
        self.chain.last().map(String::as_str)
    }

    /// Looks up a resolved argument value by name (case-insensitive).
    pub fn arg(&self, name: &str) -> Option<&'a ArgValue> {
        self.args.get(&name.to_ascii_lowercase())
    }
}

impl fmt::Debug for ExecContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecContext")
            .field("invoker", &self.invoker.name())
            .field("root", &self.root)
            .field("chain", &self.chain)
            .field("args", &self.args)
            .field("raw_tail", &self.raw_tail)
            .finish()
    }
}

/// Trait for command handlers.
///
/// Implemented automatically for closures, so most commands are written
/// inline:
///
/// ```rust
/// use cmdtree::{CommandSpec, ExecContext};
///
/// let spec = CommandSpec::new("ping").run(|ctx: &ExecContext| {
///     println!("pong, {}", ctx.invoker.name());
///     Ok(())
/// });
/// ```
pub trait CommandHandler: Send + Sync {
    /// Executes the command logic for one invocation.
    fn run(&self, ctx: &ExecContext<'_>) -> anyhow::Result<()>;
}

impl<F> CommandHandler for F
where
    F: Fn(&ExecContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn run(&self, ctx: &ExecContext<'_>) -> anyhow::Result<()> {
        self(ctx)
    }
}
