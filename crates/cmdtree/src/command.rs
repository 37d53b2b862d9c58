//! Command and argument definitions.
//!
//! A [`CommandSpec`] describes one node of a command tree: a root command
//! or a subcommand. Both are the same type with the same capabilities, so
//! tree operations (compile, resolve, dispatch) are uniform. Nodes carry
//! an optional permission, an executor-role requirement, aliases, an
//! ordered map of child subcommands, an ordered argument chain, and an
//! optional handler.
//!
//! Specs are built author-side with chainable setters and become
//! logically immutable once handed to the
//! [`Registry`](crate::Registry), which stores them behind `Arc`.
//!
//! ```rust
//! use cmdtree::{ArgSpec, CommandSpec, ExecContext, ExecutorRole};
//!
//! let spec = CommandSpec::new("points")
//!     .description("Manage player points")
//!     .alias("pts")
//!     .child(
//!         CommandSpec::new("add")
//!             .permission("points.add")
//!             .role(ExecutorRole::Either)
//!             .arg(ArgSpec::entity_ref("target"))
//!             .arg(ArgSpec::int32("amount").min(1.0))
//!             .run(|ctx: &ExecContext| {
//!                 let amount = ctx.arg("amount").and_then(|v| v.as_i32());
//!                 println!("adding {:?}", amount);
//!                 Ok(())
//!             }),
//!     );
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::handler::{CommandHandler, ExecContext};

/// The declared type of one positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArgType {
    /// A single word, or the whole remaining tail when greedy.
    Text,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit float.
    Float64,
    /// Exactly `true` or `false`.
    Bool,
    /// A raw entity name token, resolved by the handler at execution
    /// time, never by the engine.
    EntityRef,
}

/// The invoker classification required for a node to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ExecutorRole {
    /// Only player-classified invokers may run the node.
    PlayerOnly,
    /// Only the console may run the node.
    ConsoleOnly,
    /// Any invoker may run the node.
    #[default]
    Either,
}

/// Immutable description of one positional parameter.
///
/// Numeric bounds default to the full range of the declared type; string
/// bounds default to unbounded. Bounds wider than the type's own range
/// are clamped to it at coercion time.
#[derive(Debug, Clone, Serialize)]
pub struct ArgSpec {
    name: String,
    ty: ArgType,
    min: f64,
    max: f64,
    min_len: usize,
    max_len: Option<usize>,
    greedy: bool,
    optional: bool,
}

impl ArgSpec {
    fn new(name: impl Into<String>, ty: ArgType) -> Self {
        Self {
            name: name.into(),
            ty,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            min_len: 0,
            max_len: None,
            greedy: false,
            optional: false,
        }
    }

    /// A single-word text argument.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::Text)
    }

    /// A 32-bit integer argument.
    pub fn int32(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::Int32)
    }

    /// A 64-bit integer argument.
    pub fn int64(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::Int64)
    }

    /// A 64-bit float argument.
    pub fn float64(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::Float64)
    }

    /// A boolean argument accepting exactly `true` or `false`.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::Bool)
    }

    /// An unresolved entity-reference argument.
    pub fn entity_ref(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::EntityRef)
    }

    /// Sets the inclusive lower numeric bound.
    pub fn min(mut self, min: f64) -> Self {
        self.min = min;
        self
    }

    /// Sets the inclusive upper numeric bound.
    pub fn max(mut self, max: f64) -> Self {
        self.max = max;
        self
    }

    /// Sets the minimum accepted text length, in characters.
    pub fn min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }

    /// Sets the maximum accepted text length, in characters.
    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Marks a text argument as greedy: it consumes all remaining tokens
    /// as one value. Only meaningful for [`ArgType::Text`]; a greedy
    /// argument must be the last in its chain.
    pub fn greedy(mut self) -> Self {
        self.greedy = true;
        self
    }

    /// Marks the argument as optional: resolution may stop before it.
    /// Optional arguments must trail all required ones.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// The argument name as declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type.
    pub fn ty(&self) -> ArgType {
        self.ty
    }

    /// The declared numeric bounds, before clamping to the type's range.
    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// The declared text length bounds.
    pub fn len_bounds(&self) -> (usize, Option<usize>) {
        (self.min_len, self.max_len)
    }

    /// Whether this is a greedy text argument.
    pub fn is_greedy(&self) -> bool {
        self.greedy && self.ty == ArgType::Text
    }

    /// Whether resolution may stop before this argument.
    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// A typed value extracted for one argument during one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ArgValue {
    /// A text value.
    Text(String),
    /// A 32-bit integer.
    Int32(i32),
    /// A 64-bit integer.
    Int64(i64),
    /// A 64-bit float.
    Float64(f64),
    /// A boolean.
    Bool(bool),
    /// A raw, unresolved entity name.
    EntityRef(String),
}

impl ArgValue {
    /// The text content for [`Text`](ArgValue::Text) and
    /// [`EntityRef`](ArgValue::EntityRef) values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) | ArgValue::EntityRef(s) => Some(s),
            _ => None,
        }
    }

    /// The value as `i32`, if it is one.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ArgValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `i64`, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `f64`, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `bool`, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// A definition of one command-tree node: a root command or a subcommand.
///
/// Child and argument names are unique per node, compared
/// case-insensitively; re-registering a name overwrites the previous
/// entry. Insertion order is preserved for both maps and determines the
/// argument chain order.
#[derive(Clone)]
pub struct CommandSpec {
    name: String,
    permission: Option<String>,
    description: Option<String>,
    aliases: Vec<String>,
    role: ExecutorRole,
    children: IndexMap<String, CommandSpec>,
    arguments: IndexMap<String, ArgSpec>,
    handler: Option<Arc<dyn CommandHandler>>,
}

impl CommandSpec {
    /// Creates a new node with the given name and no metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permission: None,
            description: None,
            aliases: Vec::new(),
            role: ExecutorRole::Either,
            children: IndexMap::new(),
            arguments: IndexMap::new(),
            handler: None,
        }
    }

    /// Sets the permission string required to run this node.
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    /// Sets the human-readable description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds one alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Sets the executor-role requirement.
    pub fn role(mut self, role: ExecutorRole) -> Self {
        self.role = role;
        self
    }

    /// Adds a child subcommand, keyed by its lowercase name. A child
    /// with the same name replaces the previous one.
    pub fn child(mut self, child: CommandSpec) -> Self {
        self.children
            .insert(child.name.to_ascii_lowercase(), child);
        self
    }

    /// Appends an argument to the chain, keyed by its lowercase name.
    /// An argument with the same name replaces the previous one.
    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.arguments.insert(arg.name.to_ascii_lowercase(), arg);
        self
    }

    /// Sets the handler from a closure.
    pub fn run<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    /// Sets the handler from a shared trait object.
    pub fn handler_arc(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// The node name as declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared permission, if any.
    pub fn permission_str(&self) -> Option<&str> {
        self.permission.as_deref()
    }

    /// True if a non-empty permission is declared.
    pub fn has_permission(&self) -> bool {
        self.permission.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// The description, if any.
    pub fn description_str(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The alias list, in declaration order.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// The executor-role requirement.
    pub fn executor_role(&self) -> ExecutorRole {
        self.role
    }

    /// The ordered child map, keyed by lowercase name.
    pub fn children(&self) -> &IndexMap<String, CommandSpec> {
        &self.children
    }

    /// The ordered argument map, keyed by lowercase name.
    pub fn arguments(&self) -> &IndexMap<String, ArgSpec> {
        &self.arguments
    }

    /// Looks up a child by name, case-insensitively.
    pub fn get_child(&self, name: &str) -> Option<&CommandSpec> {
        self.children.get(&name.to_ascii_lowercase())
    }

    /// Looks up an argument by name, case-insensitively.
    pub fn get_argument(&self, name: &str) -> Option<&ArgSpec> {
        self.arguments.get(&name.to_ascii_lowercase())
    }

    /// The handler, if one is set.
    pub fn handler(&self) -> Option<&Arc<dyn CommandHandler>> {
        self.handler.as_ref()
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("permission", &self.permission)
            .field("aliases", &self.aliases)
            .field("role", &self.role)
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .field("arguments", &self.arguments.keys().collect::<Vec<_>>())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}
