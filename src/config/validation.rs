//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Protocol line limit from RFC 1459, CRLF excluded.
const MAX_PROTOCOL_LINE: usize = 510;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.address is required")]
    MissingAddress,
    #[error("server.address must be host:port, got '{0}'")]
    InvalidAddress(String),
    #[error("server.nick is invalid: '{0}'")]
    InvalidNick(String),
    #[error("server.channels entry must start with '#' or '&', got '{0}'")]
    InvalidChannel(String),
    #[error("dispatch.min_pool_workers must be at least 1")]
    EmptyPool,
    #[error("dispatch pool sizes must satisfy min <= initial <= max, got {min} <= {initial} <= {max}")]
    PoolBounds { min: usize, initial: usize, max: usize },
    #[error("dispatch.backlog_threshold must be at least 1")]
    ZeroBacklog,
    #[error("dispatch.stall_threshold_ms must be greater than 0")]
    ZeroStall,
    #[error("output.burst must be at least 1 when pacing is enabled")]
    ZeroBurst,
    #[error("output.max_line_bytes must be between 64 and 510, got {0}")]
    LineLength(usize),
    #[error("commands.prefix must not be empty or contain spaces")]
    InvalidPrefix,
}

fn is_valid_nick(nick: &str) -> bool {
    let mut chars = nick.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let special = |c: char| "[]\\`_^{|}".contains(c);
    (first.is_ascii_alphabetic() || special(first))
        && chars.all(|c| c.is_ascii_alphanumeric() || special(c) || c == '-')
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let server = &config.server;
    if server.address.is_empty() {
        errors.push(ValidationError::MissingAddress);
    } else if !server
        .address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
    {
        errors.push(ValidationError::InvalidAddress(server.address.clone()));
    }
    if !is_valid_nick(&server.nick) {
        errors.push(ValidationError::InvalidNick(server.nick.clone()));
    }
    for channel in &server.channels {
        if !(channel.starts_with('#') || channel.starts_with('&')) || channel.contains(' ') {
            errors.push(ValidationError::InvalidChannel(channel.clone()));
        }
    }

    let dispatch = &config.dispatch;
    if dispatch.min_pool_workers == 0 {
        errors.push(ValidationError::EmptyPool);
    }
    if dispatch.min_pool_workers > dispatch.pool_workers
        || dispatch.pool_workers > dispatch.max_pool_workers
    {
        errors.push(ValidationError::PoolBounds {
            min: dispatch.min_pool_workers,
            initial: dispatch.pool_workers,
            max: dispatch.max_pool_workers,
        });
    }
    if dispatch.backlog_threshold == 0 {
        errors.push(ValidationError::ZeroBacklog);
    }
    if dispatch.stall_threshold_ms == 0 {
        errors.push(ValidationError::ZeroStall);
    }

    let output = &config.output;
    if output.lines_per_second > 0 && output.burst == 0 {
        errors.push(ValidationError::ZeroBurst);
    }
    if !(64..=MAX_PROTOCOL_LINE).contains(&output.max_line_bytes) {
        errors.push(ValidationError::LineLength(output.max_line_bytes));
    }

    if config.commands.prefix.is_empty() || config.commands.prefix.contains(' ') {
        errors.push(ValidationError::InvalidPrefix);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
