//! Declarative command trees with live dispatch.
//!
//! `cmdtree` turns a tree of command definitions into something a host
//! program can route text commands through. A [`CommandSpec`] declares a
//! command's name, aliases, permission, executor role, subcommands, and
//! typed arguments; a [`Registry`] holds the current definition for each
//! root name; a [`CommandGraph`] resolves whitespace-split tokens into an
//! [`Invocation`]; and a [`Dispatcher`] checks access, binds arguments,
//! and runs the handler.
//!
//! The central design point is that compiled graphs carry *names*, not
//! definitions. Dispatch re-fetches the live definition from the registry
//! on every execution, so re-registering a command under the same name
//! swaps its whole behavior — permission, role, handler, subcommands —
//! without recompiling anything.
//!
//! ```
//! use cmdtree::{ArgSpec, CommandSpec, Dispatcher, Registry};
//! # use cmdtree::{Invoker, InvokerKind};
//! # struct Console;
//! # impl Invoker for Console {
//! #     fn name(&self) -> &str { "console" }
//! #     fn kind(&self) -> InvokerKind { InvokerKind::Console }
//! #     fn has_permission(&self, _permission: &str) -> bool { true }
//! # }
//!
//! let registry = Registry::new();
//! registry.register(
//!     CommandSpec::new("points").child(
//!         CommandSpec::new("add")
//!             .arg(ArgSpec::entity_ref("target"))
//!             .arg(ArgSpec::int32("amount").min(1.0))
//!             .run(|ctx: &cmdtree::ExecContext| {
//!                 let amount = ctx.arg("amount").and_then(|v| v.as_i32());
//!                 println!("adding {amount:?}");
//!                 Ok(())
//!             }),
//!     ),
//! )?;
//!
//! let dispatcher = Dispatcher::new(registry.clone());
//! for graph in registry.graphs() {
//!     if let Some(invocation) = graph.resolve(&["points", "add", "steve", "5"]) {
//!         dispatcher.execute(&Console, &invocation);
//!     }
//! }
//! # Ok::<(), cmdtree::RegistryError>(())
//! ```
//!
//! Structured failures ([`CommandError`]) flow to a pluggable
//! [`ExceptionSink`]; resolution failures are silent and simply yield no
//! invocation.

mod coerce;
mod command;
mod dispatch;
mod error;
mod handler;
mod registry;
mod tree;

pub use command::{ArgSpec, ArgType, ArgValue, CommandSpec, ExecutorRole};
pub use dispatch::{Dispatcher, ExceptionSink};
pub use error::{
    CommandError, RegistryError, EXECUTOR_CONSOLE, EXECUTOR_PLAYER, NO_PERMISSION,
};
pub use handler::{BoundArgs, CommandHandler, ExecContext, Invoker, InvokerKind};
pub use registry::Registry;
pub use tree::{CommandGraph, Invocation};
