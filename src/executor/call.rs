//! Handler invocations as worker jobs.

use crate::error::JobError;
use crate::handlers::core::{Classification, Context, Descriptor};
use crate::telemetry::{HandlerTimer, spans};
use crate::work::{CancelToken, Job, Processor};
use std::sync::Arc;

/// One pending handler call: descriptor, raw line and context.
pub struct Call {
    descriptor: Arc<Descriptor>,
    line: Arc<str>,
    ctx: Context,
}

impl Call {
    pub fn new(descriptor: Arc<Descriptor>, line: Arc<str>, ctx: Context) -> Self {
        Self {
            descriptor,
            line,
            ctx,
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn line(&self) -> &str {
        &self.line
    }
}

impl Job for Call {
    fn is_threadsafe(&self) -> bool {
        self.descriptor.classification() == Classification::Threadsafe
    }

    fn label(&self) -> &str {
        self.descriptor.name()
    }

    fn describe(&self) -> String {
        format!("{}({:?})", self.descriptor.name(), self.line.trim_end())
    }
}

/// Runs a [`Call`] against its callback.
#[derive(Debug, Default)]
pub struct CallProcessor;

impl Processor<Call> for CallProcessor {
    fn process(&self, job: &Call, cancel: &CancelToken) -> Result<(), JobError> {
        let name = job.descriptor.name();
        let _span = spans::handler(name, job.descriptor.classification().as_str()).entered();
        let _timer = HandlerTimer::new(name);
        let ctx = job.ctx.with_cancel(cancel);
        job.descriptor.callback().call(&ctx, &job.line)?;
        Ok(())
    }
}
