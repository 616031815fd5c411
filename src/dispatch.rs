//! Line dispatcher.
//!
//! Turns one raw protocol line into handler calls: resolve the trigger, look
//! up `ALL` handlers then the trigger's own, rebalance the pool once, and
//! submit every call to the executor its classification names.

use crate::config::DispatchConfig;
use crate::executor::{
    Call, CallProcessor, Executor, InlineExecutor, PoolExecutor, PoolSettings, SingleWorkerExecutor,
};
use crate::handlers::core::{Classification, Context, DIE, Registry};
use crate::metrics;
use crate::telemetry::spans;
use crate::work::Processor;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolve the trigger key of a raw line.
///
/// `PING` and `ERROR` lines carry their verb first. Everything else the
/// server sends is prefixed, so the verb or numeric is the second token. A
/// one-token line uses that token, an empty line yields an empty key. The
/// result is lower-cased.
pub fn trigger_of(line: &str) -> String {
    let mut tokens = line.split_whitespace();
    let Some(first) = tokens.next() else {
        return String::new();
    };
    if first.eq_ignore_ascii_case("PING") || first.eq_ignore_ascii_case("ERROR") {
        return first.to_ascii_lowercase();
    }
    tokens.next().unwrap_or(first).to_ascii_lowercase()
}

/// Routes lines to handlers. Owned by the thread reading the connection.
pub struct Dispatcher {
    ctx: Context,
    inline: InlineExecutor<Call>,
    general: SingleWorkerExecutor<Call>,
    background: SingleWorkerExecutor<Call>,
    pool: PoolExecutor<Call>,
    grace: Duration,
    lines: u64,
    shut_down: bool,
}

impl Dispatcher {
    /// Spawn the general, background and pool workers.
    pub fn new(ctx: Context, config: &DispatchConfig) -> io::Result<Self> {
        let processor: Arc<dyn Processor<Call>> = Arc::new(CallProcessor);
        let general = SingleWorkerExecutor::spawn("general", Arc::clone(&processor))?;
        let background = SingleWorkerExecutor::spawn("background", Arc::clone(&processor))?;
        let pool = PoolExecutor::new(Arc::clone(&processor), PoolSettings::from(config))?;
        debug!(pool = pool.len(), "Dispatcher ready");

        Ok(Self {
            ctx,
            inline: InlineExecutor::new(processor),
            general,
            background,
            pool,
            grace: config.shutdown_grace(),
            lines: 0,
            shut_down: false,
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.ctx.registry()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn pool(&self) -> &PoolExecutor<Call> {
        &self.pool
    }

    /// Lines dispatched so far.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Dispatch one raw line. Returns the number of handler calls submitted.
    ///
    /// Handler failures never surface here; they are logged where the
    /// handler runs.
    pub fn dispatch(&mut self, raw: &str) -> usize {
        if self.shut_down {
            warn!(line = %raw.trim_end(), "Dispatch after shutdown ignored");
            return 0;
        }
        self.lines += 1;

        let trigger = trigger_of(raw);
        let handlers = self.ctx.registry().lookup(&trigger);
        let _span = spans::dispatch(&trigger, handlers.len()).entered();
        metrics::record_line_dispatched(if trigger.is_empty() { "-" } else { &trigger });

        self.pool.rebalance();

        let line: Arc<str> = Arc::from(raw);
        for descriptor in &handlers {
            let call = Call::new(Arc::clone(descriptor), Arc::clone(&line), self.ctx.clone());
            self.executor_for(descriptor.classification()).call(call);
        }
        handlers.len()
    }

    fn executor_for(&self, classification: Classification) -> &dyn Executor<Call> {
        match classification {
            Classification::General => &self.general,
            Classification::Inline => &self.inline,
            Classification::Threadsafe => &self.pool,
            Classification::Background => &self.background,
        }
    }

    /// Run the `DIE` handlers once, inline, then stop every executor and
    /// the printer. A second call is a no-op.
    ///
    /// Returns `false` if some thread had to be detached.
    pub fn shutdown(&mut self) -> bool {
        if self.shut_down {
            return true;
        }
        self.shut_down = true;

        let hooks = self.ctx.registry().handlers_for(DIE);
        info!(hooks = hooks.len(), lines = self.lines, "Dispatcher shutting down");
        let line: Arc<str> = Arc::from(DIE);
        for descriptor in hooks {
            self.inline.call(Call::new(descriptor, Arc::clone(&line), self.ctx.clone()));
        }

        let grace = self.grace;
        let mut clean = self.general.shutdown(grace);
        clean &= self.background.shutdown(grace);
        clean &= self.pool.shutdown(grace);
        clean &= self.inline.shutdown(grace);
        clean &= self.ctx.printer().shutdown(grace);
        if !clean {
            warn!("Some workers were detached at shutdown");
        }
        clean
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("lines", &self.lines)
            .field("pool", &self.pool)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}
