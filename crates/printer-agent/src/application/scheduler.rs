//! Daily timer that triggers [`PrinterSync`] passes.
//!
//! The scheduler sleeps until the next firing instant of its
//! [`DailySchedule`], spawns one pass, and computes the following instant.
//! Sleeping happens in short slices so a cleared `running` flag is noticed
//! promptly and a wall-clock jump (suspend/resume, NTP correction) is
//! re-evaluated against the real clock instead of a stale deadline.
//!
//! At most one pass runs at a time.  A tick that arrives while a pass is still
//! in flight is skipped and logged rather than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use printer_agent_core::DailySchedule;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::sync_printer::{PrinterSync, SyncOutcome};

/// Upper bound on one sleep slice while waiting for the next firing instant.
const WAIT_SLICE: Duration = Duration::from_secs(1);

/// Whether a pass is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Syncing,
}

/// Drives sync passes on a daily schedule.
pub struct SyncScheduler {
    sync: PrinterSync,
    schedule: DailySchedule,
    syncing: AtomicBool,
}

impl SyncScheduler {
    pub fn new(sync: PrinterSync, schedule: DailySchedule) -> Self {
        Self {
            sync,
            schedule,
            syncing: AtomicBool::new(false),
        }
    }

    pub fn schedule(&self) -> DailySchedule {
        self.schedule
    }

    pub fn state(&self) -> SchedulerState {
        if self.syncing.load(Ordering::Acquire) {
            SchedulerState::Syncing
        } else {
            SchedulerState::Idle
        }
    }

    /// Runs one pass unless another is already running.
    ///
    /// Returns [`SyncOutcome::Skipped`] without touching the store or the
    /// backend when a pass is in flight.
    pub async fn tick(&self) -> SyncOutcome {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("printer sync still running; skipping this tick");
            return SyncOutcome::Skipped;
        }

        // Returns to Idle even if the pass panics or is cancelled.
        let _idle_on_exit = IdleOnDrop(&self.syncing);
        self.sync.run_pass().await
    }

    /// Spawns the timer loop.  It exits once `running` is cleared.
    pub fn spawn(self: Arc<Self>, running: Arc<AtomicBool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(running).await })
    }

    async fn run(self: Arc<Self>, running: Arc<AtomicBool>) {
        info!("printer sync scheduled {}", self.schedule);

        while running.load(Ordering::Relaxed) {
            let next = self.schedule.next_fire_after(Utc::now());
            info!("next printer sync at {next}");

            if !wait_until(next, &running).await {
                break;
            }

            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                let outcome = scheduler.tick().await;
                debug!("printer sync finished: {outcome:?}");
            });
        }

        info!("printer sync scheduler stopped");
    }
}

struct IdleOnDrop<'a>(&'a AtomicBool);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sleeps until `deadline` by the wall clock.  Returns `false` if `running`
/// was cleared first.
async fn wait_until(deadline: DateTime<Utc>, running: &AtomicBool) -> bool {
    loop {
        if !running.load(Ordering::Relaxed) {
            return false;
        }

        let now = Utc::now();
        if now >= deadline {
            return true;
        }

        let remaining = (deadline - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(remaining.min(WAIT_SLICE)).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Timelike;
    use printer_agent_core::RemoteEnvelope;
    use tokio::sync::Notify;

    use crate::application::sync_printer::{
        ActivePrinterStore, PrinterReplacement, RemotePrinterSource, SyncError,
    };

    // ── Test doubles ──────────────────────────────────────────────────────────

    struct FixedOwnerStore {
        printer: Mutex<Option<String>>,
    }

    impl FixedOwnerStore {
        fn new() -> Self {
            Self {
                printer: Mutex::new(Some("HP-1".to_string())),
            }
        }
    }

    impl ActivePrinterStore for FixedOwnerStore {
        fn owner_id(&self) -> Option<String> {
            Some("owner".to_string())
        }

        fn replace_printer_if_owner(&self, _expected_owner: &str, name: &str) -> PrinterReplacement {
            let mut printer = self.printer.lock().unwrap();
            if printer.as_deref() == Some(name) {
                return PrinterReplacement::Unchanged;
            }
            PrinterReplacement::Replaced {
                previous: printer.replace(name.to_string()),
            }
        }
    }

    /// Remote that blocks every call until released.
    #[derive(Default)]
    struct GatedRemote {
        calls: AtomicUsize,
        gate: Notify,
    }

    #[async_trait]
    impl RemotePrinterSource for GatedRemote {
        async fn fetch_default_printer(
            &self,
            _owner_id: &str,
        ) -> Result<RemoteEnvelope, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(RemoteEnvelope::ok("HP-2"))
        }
    }

    /// Remote that answers immediately and counts calls.
    #[derive(Default)]
    struct CountingRemote {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemotePrinterSource for CountingRemote {
        async fn fetch_default_printer(
            &self,
            _owner_id: &str,
        ) -> Result<RemoteEnvelope, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RemoteEnvelope::ok("HP-1"))
        }
    }

    fn scheduler_with(remote: Arc<dyn RemotePrinterSource>, schedule: DailySchedule) -> Arc<SyncScheduler> {
        let sync = PrinterSync::new(Arc::new(FixedOwnerStore::new()), remote);
        Arc::new(SyncScheduler::new(sync, schedule))
    }

    // ── Overlap guard ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_tick_while_pass_in_flight_is_skipped() {
        // Arrange: first pass blocks inside the remote call.
        let remote = Arc::new(GatedRemote::default());
        let scheduler = scheduler_with(remote.clone(), DailySchedule::default());

        let first = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.tick().await })
        };
        while remote.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(scheduler.state(), SchedulerState::Syncing);

        // Act
        let second = scheduler.tick().await;

        // Assert
        assert_eq!(second, SyncOutcome::Skipped);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);

        remote.gate.notify_one();
        let first = first.await.unwrap();
        assert!(matches!(first, SyncOutcome::Updated { .. }));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_sequential_ticks_both_run() {
        let remote = Arc::new(CountingRemote::default());
        let scheduler = scheduler_with(remote.clone(), DailySchedule::default());

        scheduler.tick().await;
        scheduler.tick().await;

        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_cancelled_pass_returns_to_idle() {
        let remote = Arc::new(GatedRemote::default());
        let scheduler = scheduler_with(remote.clone(), DailySchedule::default());

        let pass = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.tick().await })
        };
        while remote.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        pass.abort();
        let _ = pass.await;

        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    // ── Timer loop ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_loop_fires_at_scheduled_second() {
        // Arrange: a UTC schedule two seconds from now.
        let at = Utc::now() + chrono::Duration::seconds(2);
        let schedule =
            DailySchedule::new(at.hour(), at.minute(), at.second(), chrono_tz::UTC).unwrap();
        let remote = Arc::new(CountingRemote::default());
        let scheduler = scheduler_with(remote.clone(), schedule);
        let running = Arc::new(AtomicBool::new(true));

        // Act
        let handle = Arc::clone(&scheduler).spawn(Arc::clone(&running));
        tokio::time::sleep(Duration::from_millis(4_000)).await;

        // Assert
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);

        running.store(false, Ordering::Relaxed);
        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("scheduler must stop after running is cleared")
            .unwrap();
    }

    #[tokio::test]
    async fn test_loop_exits_promptly_when_stopped() {
        let remote = Arc::new(CountingRemote::default());
        let scheduler = scheduler_with(remote.clone(), DailySchedule::default());
        let running = Arc::new(AtomicBool::new(true));

        let handle = Arc::clone(&scheduler).spawn(Arc::clone(&running));
        running.store(false, Ordering::Relaxed);

        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("scheduler must stop after running is cleared")
            .unwrap();
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wait_until_past_deadline_returns_immediately() {
        let running = AtomicBool::new(true);
        let past = Utc::now() - chrono::Duration::seconds(5);

        assert!(wait_until(past, &running).await);
    }
}
