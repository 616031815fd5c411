//! Prefix command router.
//!
//! Watches PRIVMSG for `<prefix><command> [args]` and runs the matching
//! command. A command that returns [`HandlerError::Usage`] has the usage text
//! sent back to the caller as a NOTICE; any other error is left to the worker
//! to log.

use super::core::{Context, Descriptor, HandlerError, HandlerResult};
use crate::line::Line;
use crate::output::Method;
use crate::plugin::Plugin;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One parsed command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<'a> {
    pub nick: &'a str,
    /// Channel or, for private messages, the caller.
    pub target: &'a str,
    pub command: &'a str,
    pub args: &'a str,
}

impl<'a> Invocation<'a> {
    /// Parse a PRIVMSG line. `None` unless the text starts with `prefix`.
    pub fn parse(line: &'a Line<'a>, prefix: &str) -> Option<Self> {
        let text = line.trailing()?.strip_prefix(prefix)?;
        let (command, args) = text.split_once(' ').unwrap_or((text, ""));
        if command.is_empty() {
            return None;
        }
        Some(Self {
            nick: line.nick()?,
            target: line.reply_target()?,
            command,
            args: args.trim(),
        })
    }
}

/// A command body. Gets the router it was routed through, so it can see the
/// whole table.
pub type Command = fn(&CommandRouter, &Context, &Invocation<'_>) -> HandlerResult;

#[derive(Clone, Copy)]
struct Entry {
    run: Command,
    help: &'static str,
}

/// Command table, loaded as the `commands` plugin.
#[derive(Clone)]
pub struct CommandRouter {
    commands: Arc<BTreeMap<&'static str, Entry>>,
}

impl Default for CommandRouter {
    fn default() -> Self {
        let mut commands = BTreeMap::new();
        commands.insert("ping", Entry { run: ping, help: "ping - check the bot is alive" });
        commands.insert("echo", Entry { run: echo, help: "echo <text> - repeat text" });
        commands.insert("help", Entry { run: help, help: "help - list commands" });
        Self {
            commands: Arc::new(commands),
        }
    }
}

impl CommandRouter {
    /// Add or replace a command. `help` is listed by `help` after the prefix.
    pub fn with_command(mut self, name: &'static str, help: &'static str, run: Command) -> Self {
        Arc::make_mut(&mut self.commands).insert(name, Entry { run, help });
        self
    }

    /// Route one PRIVMSG line.
    pub fn route(&self, ctx: &Context, raw: &str) -> HandlerResult {
        let Some(line) = Line::parse(raw) else {
            return Ok(());
        };
        let Some(invocation) = Invocation::parse(&line, &ctx.config().commands.prefix) else {
            return Ok(());
        };
        let Some(entry) = self.commands.get(invocation.command.to_ascii_lowercase().as_str()) else {
            debug!(command = %invocation.command, nick = %invocation.nick, "Unknown command");
            return Ok(());
        };

        match (entry.run)(self, ctx, &invocation) {
            Err(HandlerError::Usage(usage)) => {
                ctx.message(&format!("usage: {usage}"), invocation.nick, Method::Notice);
                Ok(())
            }
            other => other,
        }
    }

    pub fn commands(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.commands.iter().map(|(name, entry)| (*name, entry.help))
    }
}

impl Plugin for CommandRouter {
    fn name(&self) -> &str {
        "commands"
    }

    fn callbacks(&self) -> Vec<(&'static str, Descriptor)> {
        let router = self.clone();
        vec![(
            "privmsg",
            Descriptor::general("route", move |ctx: &Context, line: &str| router.route(ctx, line)),
        )]
    }
}

fn ping(_: &CommandRouter, ctx: &Context, inv: &Invocation<'_>) -> HandlerResult {
    ctx.message(&format!("{}: pong", inv.nick), inv.target, Method::Privmsg);
    Ok(())
}

fn echo(_: &CommandRouter, ctx: &Context, inv: &Invocation<'_>) -> HandlerResult {
    if inv.args.is_empty() {
        return Err(HandlerError::Usage("echo <text>".into()));
    }
    ctx.message(inv.args, inv.target, Method::Privmsg);
    Ok(())
}

fn help(router: &CommandRouter, ctx: &Context, inv: &Invocation<'_>) -> HandlerResult {
    let prefix = &ctx.config().commands.prefix;
    ctx.reply_lines(
        inv.nick,
        Method::Notice,
        router.commands().map(|(_, help)| format!("{prefix}{help}")),
    );
    Ok(())
}
