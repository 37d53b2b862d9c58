//! Interactive demo: a small points economy routed through `cmdtree`.
//!
//! Reads one command per line from stdin and dispatches it, playing the
//! part of the host text-command pipeline. Run with `--console` to act
//! as the console invoker, or `--grant points.use` to grant permissions
//! to the default player invoker.

use std::collections::{HashMap, HashSet};
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use cmdtree::{
    ArgSpec, ArgValue, CommandError, CommandGraph, CommandSpec, Dispatcher, ExecContext, Invoker,
    InvokerKind, Registry,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "points", about = "Interactive points-command demo")]
struct Cli {
    /// Act as the console invoker instead of a player.
    #[arg(long)]
    console: bool,

    /// Player name to act as.
    #[arg(long, default_value = "steve")]
    name: String,

    /// Permissions granted to the player invoker (repeatable).
    #[arg(long = "grant")]
    grants: Vec<String>,
}

struct Session {
    name: String,
    kind: InvokerKind,
    grants: HashSet<String>,
}

impl Invoker for Session {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> InvokerKind {
        self.kind
    }

    fn has_permission(&self, permission: &str) -> bool {
        self.kind == InvokerKind::Console || self.grants.contains(permission)
    }
}

type Balances = Arc<Mutex<HashMap<String, i64>>>;

fn points_command(balances: &Balances) -> CommandSpec {
    let add = balances.clone();
    let take = balances.clone();
    let show = balances.clone();

    CommandSpec::new("points")
        .alias("pts")
        .permission("points.use")
        .description("Manage player point balances")
        .child(
            CommandSpec::new("add")
                .arg(ArgSpec::entity_ref("target"))
                .arg(ArgSpec::int32("amount").min(1.0))
                .run(move |ctx: &ExecContext| handle_change(&add, ctx, 1)),
        )
        .child(
            CommandSpec::new("remove")
                .arg(ArgSpec::entity_ref("target"))
                .arg(ArgSpec::int32("amount").min(1.0))
                .run(move |ctx: &ExecContext| handle_change(&take, ctx, -1)),
        )
        .child(
            CommandSpec::new("show")
                .arg(ArgSpec::entity_ref("target").optional())
                .run(move |ctx: &ExecContext| {
                    let balances = show.lock().unwrap();
                    match ctx.arg("target").and_then(ArgValue::as_str) {
                        Some(target) => {
                            let balance = balances.get(target).copied().unwrap_or(0);
                            println!("{target} has {balance} points");
                        }
                        None => {
                            if balances.is_empty() {
                                println!("no balances yet");
                            }
                            for (target, balance) in balances.iter() {
                                println!("{target}: {balance}");
                            }
                        }
                    }
                    Ok(())
                }),
        )
}

fn handle_change(balances: &Balances, ctx: &ExecContext, sign: i64) -> Result<()> {
    let target = ctx
        .arg("target")
        .and_then(ArgValue::as_str)
        .unwrap_or_default()
        .to_string();
    let amount = i64::from(ctx.arg("amount").and_then(ArgValue::as_i32).unwrap_or(0)) * sign;

    let mut balances = balances.lock().unwrap();
    let balance = balances.entry(target.clone()).or_insert(0);
    if *balance + amount < 0 {
        return Err(CommandError::new("points.would-go-negative")
            .with("target", target)
            .with("balance", *balance)
            .into());
    }
    *balance += amount;
    println!("{target} now has {balance} points");
    Ok(())
}

fn describe(err: &CommandError) -> String {
    match err.id() {
        "sender.no-permission" => {
            let permission = err
                .get("permission")
                .and_then(|v| v.as_str())
                .unwrap_or("?");
            format!("You lack the permission '{permission}'.")
        }
        "executor-type.player" => "Only players can run this command.".to_string(),
        "executor-type.console" => "Only the console can run this command.".to_string(),
        "points.would-go-negative" => {
            let target = err.get("target").and_then(|v| v.as_str()).unwrap_or("?");
            format!("{target} does not have that many points.")
        }
        other => format!("Command failed: {other}"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let session = Session {
        name: if cli.console {
            "console".to_string()
        } else {
            cli.name
        },
        kind: if cli.console {
            InvokerKind::Console
        } else {
            InvokerKind::Player
        },
        grants: cli.grants.into_iter().collect(),
    };

    let balances: Balances = Arc::new(Mutex::new(HashMap::new()));
    let registry = Registry::new();

    // The attach hook stands in for host wiring: compile the graphs the
    // REPL will resolve against.
    let graphs: Arc<Mutex<Vec<CommandGraph>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let graphs = graphs.clone();
        registry.on_attach(move |r| {
            *graphs.lock().unwrap() = r.graphs();
            info!(commands = ?r.names(), "command graphs compiled");
        });
    }
    registry.register(points_command(&balances))?;

    let dispatcher = Dispatcher::new(registry).exception_sink(|_, err| {
        println!("{}", describe(err));
    });

    println!("Type commands (e.g. 'points add steve 5'); Ctrl-D to quit.");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        let invocation = graphs
            .lock()
            .unwrap()
            .iter()
            .find_map(|graph| graph.resolve(&tokens));
        match invocation {
            Some(invocation) => {
                dispatcher.execute(&session, &invocation);
            }
            None => println!("Unknown command."),
        }
    }
    Ok(())
}
