//! Session bootstrap: connect, register, pump lines into the dispatcher.

use crate::config::{Config, ServerConfig};
use crate::dispatch::Dispatcher;
use crate::handlers::core::{Context, Registry};
use crate::handlers::{CommandRouter, CorePlugin};
use crate::network::Connection;
use crate::output::Printer;
use crate::plugin::{Plugin, PluginHost};
use crate::telemetry::spans;
use anyhow::Context as _;
use std::sync::Arc;
use tracing::{error, info};

/// A configured bot, ready to connect.
pub struct Bot {
    config: Arc<Config>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Bot {
    /// A bot with the built-in `core` and `commands` plugins.
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            plugins: vec![Arc::new(CorePlugin), Arc::new(CommandRouter::default())],
        }
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Run one session until the server closes the connection.
    ///
    /// Returns the number of lines dispatched. A read error ends the session
    /// with an error after the dispatcher has been shut down.
    pub fn run(self) -> anyhow::Result<u64> {
        let server = &self.config.server;
        let _span = spans::session(&server.address, &server.nick).entered();

        let mut conn = Connection::connect(&server.address)
            .with_context(|| format!("failed to connect to {}", server.address))?;
        let printer = Printer::spawn(conn.writer()?, &self.config.output)?;
        let ctx = Context::new(Arc::new(Registry::new()), printer, Arc::clone(&self.config));

        let mut host = PluginHost::new(ctx.clone());
        let loaded = self
            .plugins
            .into_iter()
            .try_for_each(|plugin| host.load(plugin).map(drop));
        if let Err(e) = loaded {
            ctx.printer().shutdown(self.config.dispatch.shutdown_grace());
            return Err(e).context("failed to load plugins");
        }

        let mut dispatcher = Dispatcher::new(ctx.clone(), &self.config.dispatch)?;

        register(&ctx, server);
        info!(address = %conn.address(), "Session started");

        let result = loop {
            match conn.recv_line() {
                Ok(Some(line)) => {
                    dispatcher.dispatch(&line);
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        dispatcher.shutdown();
        host.unload_all();
        conn.close();

        let lines = dispatcher.lines();
        match result {
            Ok(()) => {
                info!(lines, "Server closed the connection");
                Ok(lines)
            }
            Err(e) => {
                error!(error = %e, lines, "Connection lost");
                Err(e).context("connection lost")
            }
        }
    }
}

/// Send the registration burst: `PASS` if configured, then `NICK` and `USER`.
fn register(ctx: &Context, server: &ServerConfig) {
    let printer = ctx.printer();
    if let Some(password) = &server.password {
        printer.send_raw(format!("PASS {password}"));
    }
    printer.send_raw(format!("NICK {}", server.nick));
    printer.send_raw(format!("USER {} 0 * :{}", server.username, server.realname));
}
