//! Command dispatch.
//!
//! The [`Dispatcher`] walks a resolved [`Invocation`] against the *live*
//! definitions in its [`Registry`]: it re-fetches the root by name,
//! descends the subcommand chain, runs the permission and executor-role
//! checks, binds arguments into a per-invocation map, and invokes the
//! target's handler.
//!
//! # Error routing
//!
//! [`execute`](Dispatcher::execute) is total: it always returns a plain
//! success/failure flag and never panics or propagates an error.
//!
//! - Structural failures (unknown name, missing chain segment) are
//!   logged and return `false` — no structured exception.
//! - Access-control failures and [`CommandError`]s raised by handlers
//!   route through the exception sink if one is set, else through a
//!   minimal default report.
//! - Any other handler error, and a handler panic, is reported through
//!   the best-effort path — never the sink — and converted to `false`,
//!   so a misbehaving handler cannot masquerade as a domain error.
//!
//! The access checks themselves are pure functions returning
//! `Result<(), CommandError>`; conversion to a reported failure happens
//! at the single exit point of `execute`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::command::{CommandSpec, ExecutorRole};
use crate::error::{CommandError, EXECUTOR_CONSOLE, EXECUTOR_PLAYER, NO_PERMISSION};
use crate::handler::{BoundArgs, ExecContext, Invoker, InvokerKind};
use crate::registry::Registry;
use crate::tree::Invocation;

/// Pluggable converter from a structured error to user-facing feedback.
///
/// At most one sink is registered per dispatcher. A sink that panics is
/// swallowed and the error is reported through the default path instead;
/// it can never re-enter dispatch control flow.
pub type ExceptionSink = Arc<dyn Fn(&dyn Invoker, &CommandError) + Send + Sync>;

/// Executes resolved invocations against the live registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Registry,
    sink: Option<ExceptionSink>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given registry, with no sink.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            sink: None,
        }
    }

    /// Sets the exception sink (chainable).
    pub fn exception_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&dyn Invoker, &CommandError) + Send + Sync + 'static,
    {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// The registry this dispatcher executes against.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Executes one resolved invocation.
    ///
    /// Returns `true` on success; `false` on any failure. The host uses
    /// the flag to decide whether to show its own "unknown or failed
    /// command" feedback.
    pub fn execute(&self, invoker: &dyn Invoker, invocation: &Invocation) -> bool {
        let Some(root) = self.registry.get(&invocation.root) else {
            warn!(command = %invocation.root, "command not found in registry");
            return false;
        };

        // Re-resolve the chain against the live tree, segment by
        // segment, so a re-registered subtree takes effect immediately.
        let mut target: &CommandSpec = &root;
        for segment in &invocation.chain {
            match target.get_child(segment) {
                Some(child) => target = child,
                None => {
                    warn!(
                        command = %invocation.root,
                        segment = %segment,
                        "subcommand missing from live definition"
                    );
                    return false;
                }
            }
        }

        let checked = check_permission(invoker, target, &root)
            .and_then(|()| check_executor_role(invoker.kind(), target.executor_role()));
        if let Err(err) = checked {
            self.report(invoker, &err);
            return false;
        }

        let args = bind_arguments(target, &invocation.args);
        let ctx = ExecContext {
            invoker,
            root: &invocation.root,
            chain: &invocation.chain,
            args: &args,
            raw_tail: &invocation.raw_tail,
        };

        let Some(handler) = target.handler() else {
            debug!(command = %invocation.root, "node has no handler; silent success");
            return true;
        };

        match catch_unwind(AssertUnwindSafe(|| handler.run(&ctx))) {
            Ok(Ok(())) => true,
            Ok(Err(err)) => match err.downcast::<CommandError>() {
                Ok(command_err) => {
                    self.report(invoker, &command_err);
                    false
                }
                Err(other) => {
                    error!(command = %invocation.root, "command execution error: {other:#}");
                    false
                }
            },
            Err(_) => {
                error!(command = %invocation.root, "command handler panicked");
                false
            }
        }
    }

    /// Routes a structured error to the sink, or to the default report.
    fn report(&self, invoker: &dyn Invoker, err: &CommandError) {
        if let Some(sink) = &self.sink {
            if catch_unwind(AssertUnwindSafe(|| sink(invoker, err))).is_ok() {
                return;
            }
            error!(id = %err.id(), "exception sink panicked; using default report");
        }
        warn!(id = %err.id(), invoker = %invoker.name(), "unhandled command exception");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Checks the target's permission against the invoker.
///
/// A target without its own non-empty permission inherits the root's.
fn check_permission(
    invoker: &dyn Invoker,
    target: &CommandSpec,
    root: &CommandSpec,
) -> Result<(), CommandError> {
    let effective = if target.has_permission() {
        target.permission_str()
    } else {
        root.permission_str()
    };

    match effective {
        Some(permission) if !permission.is_empty() && !invoker.has_permission(permission) => {
            Err(CommandError::new(NO_PERMISSION).with("permission", permission))
        }
        _ => Ok(()),
    }
}

/// Checks the invoker classification against the node's executor role.
fn check_executor_role(kind: InvokerKind, role: ExecutorRole) -> Result<(), CommandError> {
    match role {
        ExecutorRole::PlayerOnly if kind != InvokerKind::Player => {
            Err(CommandError::new(EXECUTOR_PLAYER))
        }
        ExecutorRole::ConsoleOnly if kind != InvokerKind::Console => {
            Err(CommandError::new(EXECUTOR_CONSOLE))
        }
        _ => Ok(()),
    }
}

/// Keeps only the entries declared on the target, in declaration order.
/// Unknown keys are dropped.
fn bind_arguments(target: &CommandSpec, parsed: &BoundArgs) -> BoundArgs {
    target
        .arguments()
        .keys()
        .filter_map(|key| parsed.get(key).map(|value| (key.clone(), value.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ArgSpec, ArgValue, CommandSpec};
    use crate::handler::test_support::TestInvoker;
    use serde_json::json;
    use std::sync::Mutex;

    fn invocation(root: &str, chain: &[&str], args: BoundArgs) -> Invocation {
        Invocation {
            root: root.into(),
            chain: chain.iter().map(|s| s.to_string()).collect(),
            args,
            raw_tail: Vec::new(),
        }
    }

    #[test]
    fn test_check_executor_role_matrix() {
        use ExecutorRole::*;
        use InvokerKind::*;

        assert!(check_executor_role(Player, PlayerOnly).is_ok());
        assert!(check_executor_role(Console, ConsoleOnly).is_ok());
        assert!(check_executor_role(Player, Either).is_ok());
        assert!(check_executor_role(Console, Either).is_ok());

        let err = check_executor_role(Console, PlayerOnly).unwrap_err();
        assert_eq!(err.id(), EXECUTOR_PLAYER);

        let err = check_executor_role(Player, ConsoleOnly).unwrap_err();
        assert_eq!(err.id(), EXECUTOR_CONSOLE);
    }

    #[test]
    fn test_check_permission_inherits_root() {
        let root = CommandSpec::new("points").permission("points.use");
        let child = CommandSpec::new("add");
        let denied = TestInvoker::player("steve");

        let err = check_permission(&denied, &child, &root).unwrap_err();
        assert_eq!(err.id(), NO_PERMISSION);
        assert_eq!(err.get("permission"), Some(&json!("points.use")));

        let allowed = TestInvoker::player("alex").grant("points.use");
        assert!(check_permission(&allowed, &child, &root).is_ok());
    }

    #[test]
    fn test_check_permission_target_overrides_root() {
        let root = CommandSpec::new("points").permission("points.use");
        let child = CommandSpec::new("admin").permission("points.admin");
        let invoker = TestInvoker::player("steve").grant("points.use");

        let err = check_permission(&invoker, &child, &root).unwrap_err();
        assert_eq!(err.get("permission"), Some(&json!("points.admin")));
    }

    #[test]
    fn test_execute_unknown_root_fails_without_exception() {
        let sink_hits = Arc::new(Mutex::new(0u32));
        let dispatcher = {
            let hits = sink_hits.clone();
            Dispatcher::new(Registry::new()).exception_sink(move |_, _| {
                *hits.lock().unwrap() += 1;
            })
        };
        let invoker = TestInvoker::console();

        let ok = dispatcher.execute(&invoker, &invocation("ghost", &[], BoundArgs::new()));
        assert!(!ok);
        assert_eq!(*sink_hits.lock().unwrap(), 0);
    }

    #[test]
    fn test_execute_runs_handler_with_bound_args() {
        let registry = Registry::new();
        let received = Arc::new(Mutex::new(None));
        {
            let received = received.clone();
            registry
                .register(CommandSpec::new("points").child(
                    CommandSpec::new("add").arg(ArgSpec::int32("amount")).run(
                        move |ctx: &ExecContext| {
                            *received.lock().unwrap() = Some((
                                ctx.subcommand().map(str::to_string),
                                ctx.arg("amount").cloned(),
                            ));
                            Ok(())
                        },
                    ),
                ))
                .unwrap();
        }

        let dispatcher = Dispatcher::new(registry);
        let invoker = TestInvoker::console();
        let mut args = BoundArgs::new();
        args.insert("amount".into(), ArgValue::Int32(5));

        assert!(dispatcher.execute(&invoker, &invocation("points", &["add"], args)));
        let got = received.lock().unwrap().take().unwrap();
        assert_eq!(got.0.as_deref(), Some("add"));
        assert_eq!(got.1, Some(ArgValue::Int32(5)));
    }

    #[test]
    fn test_execute_denies_missing_permission_before_handler() {
        let registry = Registry::new();
        let ran = Arc::new(Mutex::new(false));
        {
            let ran = ran.clone();
            registry
                .register(
                    CommandSpec::new("points")
                        .permission("points.use")
                        .run(move |_: &ExecContext| {
                            *ran.lock().unwrap() = true;
                            Ok(())
                        }),
                )
                .unwrap();
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = {
            let seen = seen.clone();
            Dispatcher::new(registry).exception_sink(move |_, err| {
                seen.lock()
                    .unwrap()
                    .push((err.id().to_string(), err.get("permission").cloned()));
            })
        };

        let invoker = TestInvoker::player("steve");
        assert!(!dispatcher.execute(&invoker, &invocation("points", &[], BoundArgs::new())));
        assert!(!*ran.lock().unwrap());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(NO_PERMISSION.to_string(), Some(json!("points.use")))]
        );
    }

    #[test]
    fn test_execute_role_mismatch_ids() {
        let registry = Registry::new();
        registry
            .register(CommandSpec::new("spawn").role(ExecutorRole::PlayerOnly))
            .unwrap();
        registry
            .register(CommandSpec::new("stop").role(ExecutorRole::ConsoleOnly))
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = {
            let seen = seen.clone();
            Dispatcher::new(registry).exception_sink(move |_, err| {
                seen.lock().unwrap().push(err.id().to_string());
            })
        };

        let console = TestInvoker::console();
        let player = TestInvoker::player("steve");

        assert!(!dispatcher.execute(&console, &invocation("spawn", &[], BoundArgs::new())));
        assert!(!dispatcher.execute(&player, &invocation("stop", &[], BoundArgs::new())));
        assert!(dispatcher.execute(&player, &invocation("spawn", &[], BoundArgs::new())));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![EXECUTOR_PLAYER.to_string(), EXECUTOR_CONSOLE.to_string()]
        );
    }

    #[test]
    fn test_handler_raised_command_error_reaches_sink() {
        let registry = Registry::new();
        registry
            .register(CommandSpec::new("pay").run(|_: &ExecContext| {
                Err(CommandError::new("pay.insufficient").with("balance", 3).into())
            }))
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = {
            let seen = seen.clone();
            Dispatcher::new(registry).exception_sink(move |invoker, err| {
                seen.lock()
                    .unwrap()
                    .push((invoker.name().to_string(), err.id().to_string()));
            })
        };

        let invoker = TestInvoker::player("steve");
        assert!(!dispatcher.execute(&invoker, &invocation("pay", &[], BoundArgs::new())));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("steve".to_string(), "pay.insufficient".to_string())]
        );
    }

    #[test]
    fn test_unexpected_handler_error_skips_sink() {
        let registry = Registry::new();
        registry
            .register(
                CommandSpec::new("broken")
                    .run(|_: &ExecContext| Err(anyhow::anyhow!("database unreachable"))),
            )
            .unwrap();

        let sink_hits = Arc::new(Mutex::new(0u32));
        let dispatcher = {
            let hits = sink_hits.clone();
            Dispatcher::new(registry).exception_sink(move |_, _| {
                *hits.lock().unwrap() += 1;
            })
        };

        let invoker = TestInvoker::console();
        assert!(!dispatcher.execute(&invoker, &invocation("broken", &[], BoundArgs::new())));
        assert_eq!(*sink_hits.lock().unwrap(), 0);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let registry = Registry::new();
        registry
            .register(CommandSpec::new("boom").run(|_: &ExecContext| panic!("handler bug")))
            .unwrap();

        let dispatcher = Dispatcher::new(registry);
        let invoker = TestInvoker::console();
        assert!(!dispatcher.execute(&invoker, &invocation("boom", &[], BoundArgs::new())));
    }

    #[test]
    fn test_panicking_sink_is_contained() {
        let registry = Registry::new();
        registry
            .register(CommandSpec::new("points").permission("points.use"))
            .unwrap();

        let dispatcher =
            Dispatcher::new(registry).exception_sink(|_, _| panic!("sink bug"));
        let invoker = TestInvoker::player("steve");

        assert!(!dispatcher.execute(&invoker, &invocation("points", &[], BoundArgs::new())));
    }

    #[test]
    fn test_node_without_handler_is_silent_success() {
        let registry = Registry::new();
        registry.register(CommandSpec::new("points")).unwrap();

        let dispatcher = Dispatcher::new(registry);
        let invoker = TestInvoker::console();
        assert!(dispatcher.execute(&invoker, &invocation("points", &[], BoundArgs::new())));
    }

    #[test]
    fn test_unknown_parsed_keys_are_ignored() {
        let registry = Registry::new();
        let seen_len = Arc::new(Mutex::new(usize::MAX));
        {
            let seen_len = seen_len.clone();
            registry
                .register(
                    CommandSpec::new("pay")
                        .arg(ArgSpec::int32("amount"))
                        .run(move |ctx: &ExecContext| {
                            *seen_len.lock().unwrap() = ctx.args.len();
                            Ok(())
                        }),
                )
                .unwrap();
        }

        let dispatcher = Dispatcher::new(registry);
        let invoker = TestInvoker::console();
        let mut args = BoundArgs::new();
        args.insert("amount".into(), ArgValue::Int32(5));
        args.insert("stray".into(), ArgValue::Bool(true));

        assert!(dispatcher.execute(&invoker, &invocation("pay", &[], args)));
        assert_eq!(*seen_len.lock().unwrap(), 1);
    }

    #[test]
    fn test_stale_chain_segment_fails_quietly() {
        let registry = Registry::new();
        registry
            .register(CommandSpec::new("points").child(CommandSpec::new("add")))
            .unwrap();
        // Swap in a definition without the subcommand the graph resolved.
        registry.register(CommandSpec::new("points")).unwrap();

        let sink_hits = Arc::new(Mutex::new(0u32));
        let dispatcher = {
            let hits = sink_hits.clone();
            Dispatcher::new(registry).exception_sink(move |_, _| {
                *hits.lock().unwrap() += 1;
            })
        };
        let invoker = TestInvoker::console();

        assert!(!dispatcher.execute(&invoker, &invocation("points", &["add"], BoundArgs::new())));
        assert_eq!(*sink_hits.lock().unwrap(), 0);
    }
}
