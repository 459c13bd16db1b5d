use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Poll delays, in seconds, used when no ladder is configured.
pub const DEFAULT_WATCH_TIMEOUTS: [u64; 13] =
    [10, 15, 20, 30, 60, 90, 120, 180, 240, 300, 600, 1800, 3600];

/// Increasing delays between polls of an unchanged thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffLadder {
    steps: Vec<Duration>,
}

impl BackoffLadder {
    /// Build from delays in seconds. An empty list yields the default ladder.
    pub fn from_secs(secs: &[u64]) -> Self {
        if secs.is_empty() {
            return Self::default();
        }
        Self {
            steps: secs.iter().copied().map(Duration::from_secs).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last_step(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    /// Delay at `step`, clamped to the last rung.
    pub fn delay(&self, step: usize) -> Duration {
        self.steps
            .get(step.min(self.last_step()))
            .copied()
            .unwrap_or_default()
    }
}

impl Default for BackoffLadder {
    fn default() -> Self {
        Self::from_secs(&DEFAULT_WATCH_TIMEOUTS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    WaitingForTimer,
    Fetching,
    Error,
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderState::Idle => write!(f, "idle"),
            LoaderState::WaitingForTimer => write!(f, "waiting"),
            LoaderState::Fetching => write!(f, "fetching"),
            LoaderState::Error => write!(f, "error"),
        }
    }
}

/// Decides when a resource is fetched next.
///
/// Purely a state machine: it never spawns or sleeps. The owner feeds it
/// fetch outcomes and the current time, and arms a timer for [`deadline`].
///
/// [`deadline`]: PollScheduler::deadline
#[derive(Debug)]
pub struct PollScheduler {
    ladder: BackoffLadder,
    auto_poll: bool,
    state: LoaderState,
    current_step: usize,
    last_post_count: usize,
    last_load: Option<Instant>,
    deadline: Option<Instant>,
}

impl PollScheduler {
    /// `auto_poll` is set for threads; catalogs are only fetched on request.
    pub fn new(ladder: BackoffLadder, auto_poll: bool) -> Self {
        Self {
            ladder,
            auto_poll,
            state: LoaderState::Idle,
            current_step: 0,
            last_post_count: 0,
            last_load: None,
            deadline: None,
        }
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoaderState::Fetching
    }

    /// Whether an extra fetch may be issued right now.
    pub fn can_request_more(&self) -> bool {
        self.auto_poll && self.state != LoaderState::Fetching
    }

    pub fn start(&mut self) {
        self.current_step = 0;
        self.begin_fetch();
    }

    pub fn begin_fetch(&mut self) {
        self.state = LoaderState::Fetching;
        self.deadline = None;
    }

    pub fn reset_step(&mut self) {
        self.current_step = 0;
    }

    pub fn on_success(&mut self, post_count: usize, now: Instant) {
        if post_count > self.last_post_count {
            self.last_post_count = post_count;
            self.current_step = 0;
        } else {
            self.current_step = (self.current_step + 1).min(self.ladder.last_step());
        }
        self.last_load = Some(now);

        if self.auto_poll {
            self.state = LoaderState::WaitingForTimer;
            self.deadline = Some(now + self.ladder.delay(self.current_step));
        } else {
            self.state = LoaderState::Idle;
            self.deadline = None;
        }
    }

    pub fn on_failure(&mut self) {
        self.state = LoaderState::Error;
        self.current_step = 0;
        self.deadline = None;
    }

    /// Stop polling without forgetting the backoff position.
    pub fn stop(&mut self) {
        self.state = LoaderState::Idle;
        self.deadline = None;
    }

    /// Consume an expired timer. True when a fetch should follow.
    pub fn timer_fired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now && self.state == LoaderState::WaitingForTimer => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Milliseconds until the next poll is due; zero or less means now.
    pub fn time_until_load_more(&self, now: Instant) -> i64 {
        if self.is_loading() {
            return 0;
        }
        let Some(last_load) = self.last_load else {
            return 0;
        };

        let due = last_load + self.ladder.delay(self.current_step);
        if due >= now {
            due.duration_since(now).as_millis() as i64
        } else {
            -(now.duration_since(due).as_millis() as i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread_scheduler() -> PollScheduler {
        PollScheduler::new(BackoffLadder::default(), true)
    }

    #[test]
    fn test_empty_ladder_falls_back_to_default() {
        assert_eq!(BackoffLadder::from_secs(&[]), BackoffLadder::default());
        assert_eq!(BackoffLadder::default().len(), 13);
        assert_eq!(BackoffLadder::default().delay(99), Duration::from_secs(3600));
    }

    #[test]
    fn test_step_resets_on_growth_and_climbs_otherwise() {
        let mut scheduler = thread_scheduler();
        let now = Instant::now();

        scheduler.start();
        scheduler.on_success(5, now);
        assert_eq!(scheduler.current_step(), 0);

        scheduler.begin_fetch();
        scheduler.on_success(5, now);
        assert_eq!(scheduler.current_step(), 1);

        scheduler.begin_fetch();
        scheduler.on_success(8, now);
        assert_eq!(scheduler.current_step(), 0);
    }

    #[test]
    fn test_step_is_capped_at_last_rung() {
        let mut scheduler = PollScheduler::new(BackoffLadder::from_secs(&[1, 2, 3]), true);
        let now = Instant::now();
        for _ in 0..10 {
            scheduler.begin_fetch();
            scheduler.on_success(0, now);
            assert!(scheduler.current_step() <= 2);
        }
        assert_eq!(scheduler.current_step(), 2);
        assert_eq!(scheduler.deadline(), Some(now + Duration::from_secs(3)));
    }

    #[test]
    fn test_thread_waits_and_catalog_idles() {
        let now = Instant::now();

        let mut thread = thread_scheduler();
        thread.start();
        thread.on_success(3, now);
        assert_eq!(thread.state(), LoaderState::WaitingForTimer);
        assert_eq!(thread.deadline(), Some(now + Duration::from_secs(10)));

        let mut catalog = PollScheduler::new(BackoffLadder::default(), false);
        catalog.start();
        catalog.on_success(3, now);
        assert_eq!(catalog.state(), LoaderState::Idle);
        assert_eq!(catalog.deadline(), None);
        assert!(!catalog.can_request_more());
    }

    #[test]
    fn test_failure_resets_and_clears_timer() {
        let mut scheduler = thread_scheduler();
        let now = Instant::now();
        scheduler.start();
        scheduler.on_success(1, now);
        scheduler.begin_fetch();
        scheduler.on_success(1, now);
        assert_eq!(scheduler.current_step(), 1);

        scheduler.begin_fetch();
        scheduler.on_failure();
        assert_eq!(scheduler.state(), LoaderState::Error);
        assert_eq!(scheduler.current_step(), 0);
        assert_eq!(scheduler.deadline(), None);
        assert!(scheduler.can_request_more());
    }

    #[test]
    fn test_time_until_load_more() {
        let mut scheduler = thread_scheduler();
        let now = Instant::now();
        assert_eq!(scheduler.time_until_load_more(now), 0);

        scheduler.start();
        assert_eq!(scheduler.time_until_load_more(now), 0);

        scheduler.on_success(1, now);
        assert_eq!(scheduler.time_until_load_more(now), 10_000);
        assert_eq!(
            scheduler.time_until_load_more(now + Duration::from_secs(12)),
            -2_000
        );
    }

    #[test]
    fn test_timer_fired_only_when_due() {
        let mut scheduler = thread_scheduler();
        let now = Instant::now();
        scheduler.start();
        scheduler.on_success(1, now);

        assert!(!scheduler.timer_fired(now));
        assert!(scheduler.timer_fired(now + Duration::from_secs(10)));
        assert!(!scheduler.timer_fired(now + Duration::from_secs(20)));
    }

    #[test]
    fn test_no_request_more_while_fetching() {
        let mut scheduler = thread_scheduler();
        assert!(scheduler.can_request_more());
        scheduler.start();
        assert!(!scheduler.can_request_more());
        scheduler.stop();
        assert!(scheduler.can_request_more());
    }
}
