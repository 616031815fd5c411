//! Protocol housekeeping every connection needs.
//!
//! Keepalive, autojoin, nick collision recovery, CTCP VERSION and a QUIT on
//! shutdown. Registration-critical handlers are INLINE so they answer before
//! the next line is read.

use super::core::{Context, DIE, Descriptor, HandlerError, HandlerResult};
use crate::line::{Line, ctcp_body};
use crate::output::Method;
use crate::plugin::Plugin;
use tracing::{info, warn};

pub const VERSION_REPLY: &str = concat!("relaybot ", env!("CARGO_PKG_VERSION"));

/// Built-in protocol handlers, loaded as the `core` plugin.
#[derive(Debug, Default)]
pub struct CorePlugin;

impl Plugin for CorePlugin {
    fn name(&self) -> &str {
        "core"
    }

    fn callbacks(&self) -> Vec<(&'static str, Descriptor)> {
        vec![
            ("ping", Descriptor::inline("pong", pong)),
            ("001", Descriptor::inline("autojoin", autojoin)),
            ("433", Descriptor::inline("nick_in_use", nick_in_use)),
            ("nick", Descriptor::inline("track_nick", track_nick)),
            ("privmsg", Descriptor::threadsafe("ctcp_version", ctcp_version)),
            ("error", Descriptor::general("server_error", server_error)),
            (DIE, Descriptor::inline("quit", quit)),
        ]
    }
}

fn pong(ctx: &Context, line: &str) -> HandlerResult {
    let parsed = Line::parse(line).ok_or(HandlerError::MissingParams)?;
    let token = parsed.trailing().ok_or(HandlerError::MissingParams)?;
    ctx.printer().send_raw(format!("PONG :{token}"));
    Ok(())
}

/// `001` confirms registration and the nick the server assigned.
fn autojoin(ctx: &Context, line: &str) -> HandlerResult {
    if let Some(nick) = Line::parse(line).and_then(|l| l.param(0)) {
        ctx.set_nick(nick);
    }
    let channels = &ctx.config().server.channels;
    info!(nick = %ctx.nick(), channels = channels.len(), "Registered with server");
    for channel in channels {
        ctx.printer().send_raw(format!("JOIN {channel}"));
    }
    Ok(())
}

fn nick_in_use(ctx: &Context, line: &str) -> HandlerResult {
    let parsed = Line::parse(line).ok_or(HandlerError::MissingParams)?;
    let taken = parsed.param(1).ok_or(HandlerError::MissingParams)?;
    let next = format!("{taken}_");
    warn!(taken = %taken, next = %next, "Nick in use, retrying");
    ctx.set_nick(next.as_str());
    ctx.printer().send_raw(format!("NICK {next}"));
    Ok(())
}

fn track_nick(ctx: &Context, line: &str) -> HandlerResult {
    let Some(parsed) = Line::parse(line) else {
        return Ok(());
    };
    if let (Some(old), Some(new)) = (parsed.nick(), parsed.trailing()) {
        if old == ctx.nick() {
            info!(old = %old, new = %new, "Nick changed");
            ctx.set_nick(new);
        }
    }
    Ok(())
}

fn ctcp_version(ctx: &Context, line: &str) -> HandlerResult {
    let Some(parsed) = Line::parse(line) else {
        return Ok(());
    };
    let is_version = parsed
        .trailing()
        .and_then(ctcp_body)
        .is_some_and(|body| body.eq_ignore_ascii_case("VERSION"));
    if let (true, Some(sender)) = (is_version, parsed.nick()) {
        ctx.message(&format!("\x01VERSION {VERSION_REPLY}\x01"), sender, Method::Notice);
    }
    Ok(())
}

fn server_error(_ctx: &Context, line: &str) -> HandlerResult {
    let reason = Line::parse(line).and_then(|l| l.trailing()).unwrap_or("");
    warn!(reason = %reason, "Server sent ERROR");
    Ok(())
}

fn quit(ctx: &Context, _line: &str) -> HandlerResult {
    ctx.printer().send_raw("QUIT :relaybot shutting down");
    Ok(())
}
