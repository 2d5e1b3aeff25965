//! Daily wall-clock trigger for sync cycles.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use orgmirror_core::config::TimeOfDay;

use crate::engine::SyncEngine;

/// Longest single sleep. Waking up regularly keeps the trigger honest if the
/// wall clock jumps or the host is suspended.
const MAX_SLEEP: Duration = Duration::from_secs(60);

/// Map a local wall-clock time to an instant.
///
/// Ambiguous times (clocks falling back) resolve to the earlier instant.
/// Times inside a gap (clocks springing forward) resolve to the first valid
/// local minute after the gap.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let mut probe = local;
            for _ in 0..24 * 60 {
                probe += chrono::Duration::minutes(1);
                if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                    return dt.with_timezone(&Utc);
                }
            }
            Utc.from_utc_datetime(&local)
        }
    }
}

/// The earliest instant strictly after `after` at which the local time in
/// `tz` is `time`. Recomputed from local dates each call, never from a
/// cached UTC offset.
pub fn next_occurrence(after: DateTime<Utc>, tz: Tz, time: TimeOfDay) -> DateTime<Utc> {
    let mut date = after.with_timezone(&tz).date_naive();
    loop {
        let candidate = resolve_local(tz, date.and_time(time.as_naive()));
        if candidate > after {
            return candidate;
        }
        date = match date.checked_add_days(Days::new(1)) {
            Some(d) => d,
            None => return after + chrono::Duration::days(1),
        };
    }
}

/// Trigger instants after `after`, in order. Lazy; callers bound it.
pub fn upcoming(after: DateTime<Utc>, tz: Tz, time: TimeOfDay) -> impl Iterator<Item = DateTime<Utc>> {
    std::iter::successors(Some(next_occurrence(after, tz, time)), move |at| {
        Some(next_occurrence(*at, tz, time))
    })
}

/// Handle for stopping a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl SchedulerHandle {
    pub fn channel() -> (Self, watch::Receiver<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (Self { shutdown_tx }, shutdown_rx)
    }

    /// Signals the scheduler to stop. A cycle in progress finishes first.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Source of the current wall-clock instant.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Runs one sync cycle per day at a fixed local time.
pub struct DailyScheduler {
    engine: Arc<SyncEngine>,
    timezone: Tz,
    time: TimeOfDay,
    clock: Clock,
}

impl DailyScheduler {
    pub fn new(engine: Arc<SyncEngine>, timezone: Tz, time: TimeOfDay) -> Self {
        Self {
            engine,
            timezone,
            time,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the system clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Run a single cycle now. Failures have already been logged by the engine.
    pub async fn run_once(&self) {
        if let Err(e) = self.engine.run_cycle().await {
            debug!("cycle ended early: {e}");
        }
    }

    /// Loop until `shutdown` flips to true.
    ///
    /// Triggers that pass while a cycle is running are skipped, never queued:
    /// the next trigger is always computed after the previous cycle ends.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Cloning/Updating every day at {} - {}",
            self.time, self.timezone
        );

        loop {
            let next = next_occurrence(self.now(), self.timezone, self.time);
            info!("Next backup at {}", next.with_timezone(&self.timezone));

            if !self.wait_until(next, &mut shutdown).await {
                info!("Scheduler shutting down");
                return;
            }

            self.run_once().await;

            let following = next_occurrence(next, self.timezone, self.time);
            if self.now() > following {
                warn!(
                    "Cycle started at {} ran past the next trigger; skipping it",
                    next.with_timezone(&self.timezone)
                );
            }

            if *shutdown.borrow() {
                info!("Scheduler shutting down");
                return;
            }
        }
    }

    /// Sleep until the wall clock reaches `deadline`. Returns false if
    /// shutdown was requested first.
    async fn wait_until(
        &self,
        deadline: DateTime<Utc>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            if *shutdown.borrow() {
                return false;
            }
            let remaining = match (deadline - self.now()).to_std() {
                Ok(d) if !d.is_zero() => d,
                _ => return true,
            };

            tokio::select! {
                _ = tokio::time::sleep(remaining.min(MAX_SLEEP)) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }
}
