use std::time::{Duration, Instant};

/// One-shot cancellable deadline, polled from the frame loop.
///
/// Scheduling while already pending replaces the previous deadline, so a
/// superseded trigger never fires.
#[derive(Debug, Default, Clone)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm (or re-arm) the timer to fire `delay` after `now`.
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns true exactly once when the deadline has passed, then disarms.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Time left until the deadline (zero if overdue), or None when idle.
    #[cfg(test)]
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_timer_never_fires() {
        let mut t = Timer::new();
        assert!(!t.is_pending());
        assert!(!t.fire(Instant::now() + Duration::from_secs(60)));
        assert!(t.remaining(Instant::now()).is_none());
    }

    #[test]
    fn fires_once_after_deadline() {
        let base = Instant::now();
        let mut t = Timer::new();
        t.schedule(base, Duration::from_millis(150));
        assert!(!t.fire(base + Duration::from_millis(149)));
        assert!(t.fire(base + Duration::from_millis(150)));
        assert!(!t.fire(base + Duration::from_millis(400)));
        assert!(!t.is_pending());
    }

    #[test]
    fn reschedule_pushes_deadline_back() {
        let base = Instant::now();
        let mut t = Timer::new();
        t.schedule(base, Duration::from_millis(150));
        t.schedule(base + Duration::from_millis(100), Duration::from_millis(150));
        assert!(!t.fire(base + Duration::from_millis(200)));
        assert!(t.fire(base + Duration::from_millis(250)));
    }

    #[test]
    fn cancel_disarms() {
        let base = Instant::now();
        let mut t = Timer::new();
        t.schedule(base, Duration::from_millis(10));
        t.cancel();
        assert!(!t.fire(base + Duration::from_secs(1)));
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let base = Instant::now();
        let mut t = Timer::new();
        t.schedule(base, Duration::from_millis(100));
        assert_eq!(
            t.remaining(base + Duration::from_millis(40)),
            Some(Duration::from_millis(60))
        );
        assert_eq!(
            t.remaining(base + Duration::from_millis(500)),
            Some(Duration::ZERO)
        );
    }
}
