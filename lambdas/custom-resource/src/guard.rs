use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lambda_runtime::tracing;
use tokio::task::JoinHandle;

use crate::{Error, ResponseStatus, ResponseTarget, StatusReporter};

pub const DEADLINE_MARGIN: Duration = Duration::from_millis(500);

const ARMED: u8 = 0;
const CANCELLED: u8 = 1;
const FIRED: u8 = 2;

#[derive(Default)]
struct ReportSlot(AtomicU8);

impl ReportSlot {
    fn claim(&self, next: u8) -> bool {
        self.0
            .compare_exchange(ARMED, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// The body finished in time and its status was sent.
    Reported(ResponseStatus),
    /// The body finished in time; the invocation expects no report.
    Unreported(ResponseStatus),
    /// The alarm fired first and owned the report.
    TimedOut,
}

/// Runs `body`, reporting its outcome to `target` exactly once. Past
/// `remaining - DEADLINE_MARGIN` the alarm reports `FAILED` instead.
pub async fn run_guarded<F>(
    remaining: Duration,
    target: Option<ResponseTarget>,
    reporter: Arc<dyn StatusReporter>,
    body: F,
) -> Completion
where
    F: Future<Output = anyhow::Result<()>>,
{
    let target = target.map(Arc::new);
    let slot = Arc::new(ReportSlot::default());
    let alarm = spawn_alarm(
        remaining.saturating_sub(DEADLINE_MARGIN),
        slot.clone(),
        target.clone(),
        reporter.clone(),
    );

    let status = match body.await {
        Ok(()) => ResponseStatus::Success,
        Err(e) => {
            tracing::error!("handler failed: {e:#}");
            ResponseStatus::Failed
        }
    };

    if !slot.claim(CANCELLED) {
        // The alarm may still be mid-report; aborting it could drop the only
        // report this invocation sends.
        if let Err(e) = alarm.await {
            tracing::error!("deadline alarm task failed: {e}");
        }
        return Completion::TimedOut;
    }
    alarm.abort();

    let Some(target) = target else {
        return Completion::Unreported(status);
    };
    if let Err(e) = reporter.report(&target, status).await {
        tracing::error!("failed to report {status}: {:#}", anyhow::Error::from(e));
    }
    Completion::Reported(status)
}

fn spawn_alarm(
    after: Duration,
    slot: Arc<ReportSlot>,
    target: Option<Arc<ResponseTarget>>,
    reporter: Arc<dyn StatusReporter>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if !slot.claim(FIRED) {
            return;
        }

        tracing::error!("{}, sending failure response", Error::Timeout);
        if let Some(target) = target {
            if let Err(e) = reporter.report(&target, ResponseStatus::Failed).await {
                tracing::error!("failed to report timeout: {:#}", anyhow::Error::from(e));
            }
        }
    })
}
