//! The command registry.
//!
//! A [`Registry`] is a concurrent map from lowercase command name to its
//! current definition. Registering a name that already exists atomically
//! replaces the whole subtree (last write wins, never a merge), and the
//! replacement is visible to every future dispatch without recompiling
//! any graph, because dispatch re-fetches live definitions by name.
//!
//! Registries are explicitly constructed and explicitly owned — there is
//! no hidden process-wide instance — so tests and embedders can run as
//! many independent registries as they like. The handle is cheap to
//! clone; clones share the same underlying map.
//!
//! # Host attachment
//!
//! The first successful [`register`](Registry::register) fires the
//! one-time attach hook installed with [`on_attach`](Registry::on_attach).
//! The hook is where the host wires compiled graphs into its own text
//! command pipeline; its body is entirely the host's concern.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::command::{ArgSpec, CommandSpec};
use crate::error::RegistryError;
use crate::tree::CommandGraph;

type AttachFn = Box<dyn Fn(&Registry) + Send + Sync>;

#[derive(Default)]
struct AttachState {
    hook: Option<AttachFn>,
    fired: bool,
}

#[derive(Default)]
struct RegistryInner {
    commands: RwLock<HashMap<String, Arc<CommandSpec>>>,
    attach: Mutex<AttachState>,
}

/// Concurrent store of command definitions, keyed by lowercase name.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the one-time host-attachment hook.
    ///
    /// Fires on the first successful `register`. If a command is already
    /// registered when the hook is installed, it fires immediately.
    pub fn on_attach<F>(&self, hook: F)
    where
        F: Fn(&Registry) + Send + Sync + 'static,
    {
        let fire_now = {
            let mut attach = lock(&self.inner.attach);
            if attach.fired {
                true
            } else {
                attach.hook = Some(Box::new(hook));
                return;
            }
        };
        if fire_now {
            hook(self);
        }
    }

    /// Validates and registers a definition under its lowercase name.
    ///
    /// Replaces any previous definition for that name atomically: a
    /// concurrent reader observes either the old or the new subtree,
    /// never a mixture. Safe to retry; the last caller wins.
    pub fn register(&self, spec: CommandSpec) -> Result<(), RegistryError> {
        validate(&spec)?;
        let key = spec.name().to_ascii_lowercase();
        {
            let mut commands = write_lock(&self.inner.commands);
            commands.insert(key, Arc::new(spec));
        }
        self.fire_attach();
        Ok(())
    }

    /// True if a definition exists under the given name
    /// (case-insensitive).
    pub fn is_registered(&self, name: &str) -> bool {
        read_lock(&self.inner.commands).contains_key(&name.to_ascii_lowercase())
    }

    /// The current definition for the given name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<Arc<CommandSpec>> {
        read_lock(&self.inner.commands)
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    /// A snapshot of all registered top-level names.
    pub fn names(&self) -> Vec<String> {
        read_lock(&self.inner.commands).keys().cloned().collect()
    }

    /// Compiles a graph for every currently registered definition.
    ///
    /// This is a one-time snapshot of the tree *shapes*; behavior stays
    /// live because dispatch re-fetches definitions by name.
    pub fn graphs(&self) -> Vec<CommandGraph> {
        read_lock(&self.inner.commands)
            .values()
            .map(|spec| CommandGraph::compile(spec))
            .collect()
    }

    fn fire_attach(&self) {
        let hook = {
            let mut attach = lock(&self.inner.attach);
            if attach.fired {
                return;
            }
            attach.fired = true;
            attach.hook.take()
        };
        // Called outside the lock so the hook may register more commands.
        if let Some(hook) = hook {
            hook(self);
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("commands", &self.names())
            .finish()
    }
}

fn validate(spec: &CommandSpec) -> Result<(), RegistryError> {
    if spec.name().trim().is_empty() {
        return Err(RegistryError::EmptyName);
    }
    validate_arguments(spec.name(), spec.arguments().values())?;
    for child in spec.children().values() {
        validate(child)?;
    }
    Ok(())
}

fn validate_arguments<'a>(
    command: &str,
    args: impl Iterator<Item = &'a ArgSpec>,
) -> Result<(), RegistryError> {
    let args: Vec<&ArgSpec> = args.collect();
    let mut seen_optional = false;

    for (position, arg) in args.iter().enumerate() {
        if arg.is_greedy() && position + 1 != args.len() {
            return Err(RegistryError::GreedyNotLast {
                command: command.to_string(),
                argument: arg.name().to_string(),
            });
        }
        if arg.is_optional() {
            seen_optional = true;
        } else if seen_optional {
            return Err(RegistryError::RequiredAfterOptional {
                command: command.to_string(),
                argument: arg.name().to_string(),
            });
        }
    }
    Ok(())
}

// Lock poisoning must not take the registry down: a panic while holding
// a guard leaves the map itself intact, so recover the guard and keep
// serving.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
