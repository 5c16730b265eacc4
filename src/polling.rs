//! Live-draw polling for the displayed date.
//!
//! The controller owns at most one interval task. Every fetch it issues is
//! tagged with the selection token that was current when it started, and
//! [`PollingController::accept`] drops anything whose token or date no longer
//! matches, so a slow response for an old date never replaces a newer one.
//! In-flight requests are not aborted, only ignored.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::pipeline::AcquisitionPipeline;
use crate::types::LotteryResult;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
}

/// A finished fetch on its way back to the host.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub date: String,
    pub token: u64,
    /// Poll refreshes are quiet; the host shows no loading indicator for them.
    pub quiet: bool,
    pub result: LotteryResult,
}

pub struct PollingController {
    pipeline: Arc<AcquisitionPipeline>,
    interval: Duration,
    active_date: Option<String>,
    token: u64,
    timer: Option<JoinHandle<()>>,
    outcomes: mpsc::UnboundedSender<FetchOutcome>,
}

impl PollingController {
    /// Must be driven from inside a tokio runtime.
    pub fn new(pipeline: Arc<AcquisitionPipeline>) -> (Self, mpsc::UnboundedReceiver<FetchOutcome>) {
        Self::with_interval(pipeline, POLL_INTERVAL)
    }

    pub fn with_interval(
        pipeline: Arc<AcquisitionPipeline>,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<FetchOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            pipeline,
            interval,
            active_date: None,
            token: 0,
            timer: None,
            outcomes: tx,
        };
        (controller, rx)
    }

    pub fn state(&self) -> PollState {
        match &self.timer {
            Some(handle) if !handle.is_finished() => PollState::Polling,
            _ => PollState::Idle,
        }
    }

    pub fn active_date(&self) -> Option<&str> {
        self.active_date.as_deref()
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Switches the displayed date: stops any poll, fetches the new date with
    /// a loading indicator, then decides whether to poll it.
    pub fn select_date(&mut self, date: &str) {
        self.cancel_timer();
        self.activate(date);
        self.spawn_fetch(date.to_string(), false);

        let live = self.should_poll(date);
        self.reschedule(date, live);
    }

    /// Loud re-fetch of the current date.
    pub fn refresh(&mut self) {
        if let Some(date) = self.active_date.clone() {
            self.spawn_fetch(date, false);
        }
    }

    /// Cancels the running timer, then starts a new one iff `live`.
    pub fn reschedule(&mut self, date: &str, live: bool) {
        self.cancel_timer();
        if self.active_date.as_deref() != Some(date) {
            self.activate(date);
        }

        if live {
            self.start_timer(date.to_string());
        }
    }

    /// Host-driven wall-clock re-check, so the window edges are noticed
    /// without a date change. A running poll is left alone.
    pub fn tick(&mut self) {
        let Some(date) = self.active_date.clone() else {
            return;
        };

        match (self.state(), self.should_poll(&date)) {
            (PollState::Polling, false) => {
                info!("Live window closed, stopping poll for {}", date);
                self.cancel_timer();
            }
            (PollState::Idle, true) => self.reschedule(&date, true),
            _ => {}
        }
    }

    /// Returns the result only if it belongs to the current selection.
    pub fn accept(&self, outcome: FetchOutcome) -> Option<LotteryResult> {
        let current = self.active_date.as_deref() == Some(outcome.date.as_str());
        if current && outcome.token == self.token {
            Some(outcome.result)
        } else {
            debug!(
                "Discarding stale result for {} (token {}, current {})",
                outcome.date, outcome.token, self.token
            );
            None
        }
    }

    fn should_poll(&self, date: &str) -> bool {
        self.pipeline.time().is_live_for(date)
    }

    fn activate(&mut self, date: &str) {
        self.token = self.token.wrapping_add(1);
        self.active_date = Some(date.to_string());
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
            debug!("Poll timer cancelled");
        }
    }

    fn spawn_fetch(&self, date: String, quiet: bool) {
        let pipeline = Arc::clone(&self.pipeline);
        let outcomes = self.outcomes.clone();
        let token = self.token;

        tokio::spawn(async move {
            let result = pipeline.fetch_result(&date).await;
            let _ = outcomes.send(FetchOutcome {
                date,
                token,
                quiet,
                result,
            });
        });
    }

    fn start_timer(&mut self, date: String) {
        info!("Starting live poll for {} every {:?}", date, self.interval);

        let pipeline = Arc::clone(&self.pipeline);
        let outcomes = self.outcomes.clone();
        let token = self.token;
        let interval = self.interval;

        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                debug!("Auto-updating results for {}", date);
                let result = pipeline.fetch_result(&date).await;
                let outcome = FetchOutcome {
                    date: date.clone(),
                    token,
                    quiet: true,
                    result,
                };
                if outcomes.send(outcome).is_err() {
                    break;
                }
            }
        }));
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::lookup::ResultLookup;
    use crate::time::{FixedClock, TimeService};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc::error::TryRecvError;

    #[derive(Default)]
    struct CountingLookup {
        queries: Mutex<Vec<String>>,
    }

    impl CountingLookup {
        fn count(&self, search_date: &str) -> usize {
            self.queries
                .lock()
                .unwrap()
                .iter()
                .filter(|q| *q == search_date)
                .count()
        }
    }

    #[async_trait]
    impl ResultLookup for CountingLookup {
        async fn lookup(&self, search_date: &str) -> Result<String> {
            self.queries.lock().unwrap().push(search_date.to_string());
            Ok(r#"{"prizeSpecial": "12345", "prize7": ["11", "22", "33", "44"]}"#.to_string())
        }
    }

    fn setup(
        hour: u32,
        minute: u32,
    ) -> (
        PollingController,
        mpsc::UnboundedReceiver<FetchOutcome>,
        Arc<CountingLookup>,
        Arc<FixedClock>,
    ) {
        let lookup = Arc::new(CountingLookup::default());
        let clock = Arc::new(FixedClock::at_civil(2024, 5, 10, hour, minute).unwrap());
        let time = TimeService::new(clock.clone());
        let pipeline = Arc::new(AcquisitionPipeline::new(lookup.clone(), time));
        let (controller, rx) = PollingController::new(pipeline);
        (controller, rx, lookup, clock)
    }

    #[tokio::test(start_paused = true)]
    async fn polls_today_during_live_window() {
        let (mut controller, mut rx, lookup, _clock) = setup(18, 20);

        controller.select_date("2024-05-10");
        assert_eq!(controller.state(), PollState::Polling);

        let first = rx.recv().await.unwrap();
        assert!(!first.quiet);
        let result = controller.accept(first).unwrap();
        assert!(result.is_live);

        let started = Instant::now();
        let polled = rx.recv().await.unwrap();
        assert!(polled.quiet);
        assert!(started.elapsed() >= POLL_INTERVAL);
        assert!(controller.accept(polled).is_some());
        assert_eq!(lookup.count("10/05/2024"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_outside_live_window_or_for_past_dates() {
        let (mut controller, mut rx, lookup, _clock) = setup(20, 0);
        controller.select_date("2024-05-10");
        assert_eq!(controller.state(), PollState::Idle);

        let (mut past, _past_rx, _, _) = setup(18, 20);
        past.select_date("2024-05-09");
        assert_eq!(past.state(), PollState::Idle);

        assert!(!rx.recv().await.unwrap().quiet);
        tokio::time::sleep(POLL_INTERVAL * 4).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(lookup.count("10/05/2024"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_date_cancels_poll_for_old_date() {
        let (mut controller, mut rx, lookup, _clock) = setup(18, 20);

        controller.select_date("2024-05-10");
        rx.recv().await.unwrap();
        let polled = rx.recv().await.unwrap();
        assert!(polled.quiet);

        controller.select_date("2024-05-09");
        assert_eq!(controller.state(), PollState::Idle);
        let loud = rx.recv().await.unwrap();
        assert_eq!(loud.date, "2024-05-09");
        assert!(controller.accept(loud).is_some());

        tokio::time::sleep(POLL_INTERVAL * 4).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(lookup.count("10/05/2024"), 2);
        assert_eq!(lookup.count("09/05/2024"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_results_are_discarded() {
        let (mut controller, mut rx, _lookup, _clock) = setup(20, 0);

        controller.select_date("2024-05-08");
        controller.select_date("2024-05-09");

        let mut accepted = Vec::new();
        for _ in 0..2 {
            let outcome = rx.recv().await.unwrap();
            if let Some(result) = controller.accept(outcome) {
                accepted.push(result.date);
            }
        }
        assert_eq!(accepted, vec!["2024-05-09".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn reselecting_same_date_invalidates_older_fetch() {
        let (mut controller, mut rx, _lookup, _clock) = setup(20, 0);

        controller.select_date("2024-05-09");
        let old_token = controller.token();
        controller.select_date("2024-05-09");
        assert_ne!(controller.token(), old_token);

        let mut accepted = 0;
        for _ in 0..2 {
            if controller.accept(rx.recv().await.unwrap()).is_some() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_follows_window_edges() {
        let (mut controller, mut rx, _lookup, clock) = setup(18, 10);

        controller.select_date("2024-05-10");
        assert_eq!(controller.state(), PollState::Idle);
        rx.recv().await.unwrap();

        clock.advance(chrono::Duration::minutes(3));
        controller.tick();
        assert_eq!(controller.state(), PollState::Polling);

        // Still inside the window: the running timer is kept.
        clock.advance(chrono::Duration::minutes(10));
        controller.tick();
        assert_eq!(controller.state(), PollState::Polling);

        clock.advance(chrono::Duration::minutes(13));
        controller.tick();
        assert_eq!(controller.state(), PollState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_is_loud_and_current() {
        let (mut controller, mut rx, lookup, _clock) = setup(20, 0);
        controller.refresh();

        controller.select_date("2024-05-09");
        rx.recv().await.unwrap();
        controller.refresh();

        let outcome = rx.recv().await.unwrap();
        assert!(!outcome.quiet);
        assert!(controller.accept(outcome).is_some());
        assert_eq!(lookup.count("09/05/2024"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_controller_stops_polling() {
        let (mut controller, mut rx, lookup, _clock) = setup(18, 20);
        controller.select_date("2024-05-10");
        rx.recv().await.unwrap();
        drop(controller);

        tokio::time::sleep(POLL_INTERVAL * 3).await;
        assert_eq!(lookup.count("10/05/2024"), 1);
    }
}
