//! Minimal protocol line parsing for handlers.
//!
//! The dispatcher only needs the trigger key. Handlers that care about the
//! sender, target or text parse the raw line themselves with [`Line`].

/// A borrowed view of one protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line<'a> {
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    /// Middle parameters followed by the trailing one, if any.
    pub params: Vec<&'a str>,
}

impl<'a> Line<'a> {
    /// Parse `raw`. Returns `None` for a line without a command.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let mut rest = raw.trim_end_matches(['\r', '\n']).trim_start();

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, tail) = stripped.split_once(' ').unwrap_or((stripped, ""));
                rest = tail.trim_start();
                Some(prefix)
            }
            None => None,
        };

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing);
                break;
            }
            let (param, tail) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param);
            rest = tail;
        }

        Some(Self {
            prefix,
            command,
            params,
        })
    }

    /// Nick part of a `nick!user@host` prefix.
    pub fn nick(&self) -> Option<&'a str> {
        let prefix = self.prefix?;
        Some(prefix.split_once('!').map_or(prefix, |(nick, _)| nick))
    }

    pub fn param(&self, index: usize) -> Option<&'a str> {
        self.params.get(index).copied()
    }

    /// Last parameter: the message text of a PRIVMSG or NOTICE.
    pub fn trailing(&self) -> Option<&'a str> {
        self.params.last().copied()
    }

    /// Where a reply to this message should go: the channel it was sent to,
    /// or the sender for a private message.
    pub fn reply_target(&self) -> Option<&'a str> {
        let target = self.param(0)?;
        if is_channel(target) {
            Some(target)
        } else {
            self.nick()
        }
    }
}

pub fn is_channel(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}

/// Payload of a CTCP request (`\x01VERSION\x01`), without the delimiters.
pub fn ctcp_body(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('\x01')?;
    Some(inner.strip_suffix('\x01').unwrap_or(inner))
}
