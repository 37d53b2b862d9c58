//! Compiled command graphs and token resolution.
//!
//! [`CommandGraph::compile`] is a pure, recursive compilation of a
//! [`CommandSpec`] into a graph of matchable segments: one literal
//! segment per node (name plus aliases), child literals as alternative
//! branches, and the node's arguments as a linear chain of typed
//! matchers. Every literal segment and every argument position is a
//! valid terminal.
//!
//! Terminal actions never capture the `CommandSpec` itself. A resolved
//! [`Invocation`] carries only the **name path** (root name plus the
//! subcommand chain); the dispatcher re-fetches the live definition from
//! the [`Registry`](crate::Registry) at execution time, so re-registering
//! a command changes behavior for every already-compiled graph without a
//! rebuild.
//!
//! # Resolution precedence
//!
//! At any branching point, a token that matches a child literal's name or
//! alias (case-insensitively) is consumed as that child; only when no
//! literal matches is the token offered to the argument chain. The
//! precedence is fixed and not configurable, mirroring conventional
//! literal-first command-line resolution.

use serde::Serialize;

use crate::coerce;
use crate::command::{ArgSpec, CommandSpec};
use crate::handler::BoundArgs;

/// One resolved path through a graph, ready for dispatch.
///
/// Carries names and values only, never definition objects: the
/// dispatcher looks the live definitions up by name.
#[derive(Debug, Clone, Serialize)]
pub struct Invocation {
    /// The root command name (lowercase).
    pub root: String,
    /// The full ordered subcommand chain below the root; empty when the
    /// root itself is the target.
    pub chain: Vec<String>,
    /// Argument values extracted by the chain, keyed by lowercase name.
    pub args: BoundArgs,
    /// Raw tokens that followed the deepest resolved literal.
    pub raw_tail: Vec<String>,
}

/// A literal segment: matches the node's own name or one of its aliases.
#[derive(Debug, Clone)]
struct LiteralNode {
    /// Lowercase node name.
    name: String,
    /// Lowercase aliases.
    aliases: Vec<String>,
    /// Name path from the root down to (and including) this node,
    /// excluding the root name itself.
    chain: Vec<String>,
    /// Child literals, in declaration order.
    children: Vec<LiteralNode>,
    /// The argument chain, in declaration order.
    args: Vec<ArgSpec>,
}

impl LiteralNode {
    fn matches(&self, token: &str) -> bool {
        let token = token.to_ascii_lowercase();
        token == self.name || self.aliases.contains(&token)
    }
}

/// A compiled, traversable graph for one root command.
#[derive(Debug, Clone)]
pub struct CommandGraph {
    root: LiteralNode,
}

impl CommandGraph {
    /// Compiles a definition into a traversable graph.
    ///
    /// Pure: the graph holds copies of names, aliases, and argument
    /// specs, and no handler or definition references.
    pub fn compile(spec: &CommandSpec) -> Self {
        Self {
            root: build_literal(spec, Vec::new()),
        }
    }

    /// The root command name this graph matches (lowercase).
    pub fn root_name(&self) -> &str {
        &self.root.name
    }

    /// Resolves a full token list (root name first) against the graph.
    ///
    /// Returns `None` when the tokens match no path: unknown literal,
    /// failed coercion, missing required argument, or trailing tokens no
    /// position consumes. The host treats `None` as "unknown command".
    pub fn resolve(&self, tokens: &[&str]) -> Option<Invocation> {
        let first = tokens.first()?;
        if !self.root.matches(first) {
            return None;
        }
        resolve_node(&self.root, &tokens[1..]).map(|(chain, args, raw_tail)| Invocation {
            root: self.root.name.clone(),
            chain,
            args,
            raw_tail,
        })
    }
}

fn build_literal(spec: &CommandSpec, chain: Vec<String>) -> LiteralNode {
    let children = spec
        .children()
        .values()
        .map(|child| {
            let mut child_chain = chain.clone();
            child_chain.push(child.name().to_ascii_lowercase());
            build_literal(child, child_chain)
        })
        .collect();

    LiteralNode {
        name: spec.name().to_ascii_lowercase(),
        aliases: spec
            .aliases()
            .iter()
            .map(|a| a.to_ascii_lowercase())
            .collect(),
        chain,
        children,
        args: spec.arguments().values().cloned().collect(),
    }
}

type Resolved = (Vec<String>, BoundArgs, Vec<String>);

fn resolve_node(node: &LiteralNode, rest: &[&str]) -> Option<Resolved> {
    if let Some(token) = rest.first() {
        // Literal-first: a matching child consumes the token for good;
        // there is no backtracking into the argument chain afterwards.
        for child in &node.children {
            if child.matches(token) {
                return resolve_node(child, &rest[1..]);
            }
        }
        return match_args(node, rest);
    }

    // No tokens left: the literal's own default terminal. Required
    // arguments only constrain invocations that start the chain.
    Some((node.chain.clone(), BoundArgs::new(), Vec::new()))
}

fn match_args(node: &LiteralNode, rest: &[&str]) -> Option<Resolved> {
    let mut bound = BoundArgs::new();
    let mut consumed = 0;

    for (position, spec) in node.args.iter().enumerate() {
        if consumed >= rest.len() {
            // Tokens ran out mid-chain: acceptable only if everything
            // that remains is optional.
            if node.args[position..].iter().all(ArgSpec::is_optional) {
                break;
            }
            return None;
        }

        let value = if spec.is_greedy() {
            let v = coerce::coerce_greedy(spec, &rest[consumed..])?;
            consumed = rest.len();
            v
        } else {
            let v = coerce::coerce_single(spec, rest[consumed])?;
            consumed += 1;
            v
        };
        bound.insert(spec.name().to_ascii_lowercase(), value);
    }

    if consumed < rest.len() {
        return None;
    }

    let raw_tail = rest.iter().map(|t| t.to_string()).collect();
    Some((node.chain.clone(), bound, raw_tail))
}
