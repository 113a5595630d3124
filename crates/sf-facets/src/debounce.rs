//! Trailing-edge debouncing against host-supplied monotonic time.

use core::time::Duration;

/// Holds the most recent payload until `wait` has passed without another schedule.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    wait: Duration,
    pending: Option<(Duration, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            pending: None,
        }
    }

    /// Replaces any pending payload and restarts the quiet period at `now`.
    pub fn schedule(&mut self, now: Duration, payload: T) {
        self.pending = Some((now.saturating_add(self.wait), payload));
    }

    /// Takes the payload once its deadline has been reached.
    pub fn poll(&mut self, now: Duration) -> Option<T> {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|(deadline, _)| now >= *deadline);
        if !ready {
            return None;
        }
        self.pending.take().map(|(_, payload)| payload)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::Debouncer;
    use core::time::Duration;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn fires_once_after_quiet_period_with_last_payload() {
        let mut debouncer = Debouncer::new(ms(800));
        debouncer.schedule(ms(0), "a");
        debouncer.schedule(ms(500), "b");
        assert_eq!(debouncer.poll(ms(1000)), None);
        assert_eq!(debouncer.deadline(), Some(ms(1300)));
        assert_eq!(debouncer.poll(ms(1300)), Some("b"));
        assert_eq!(debouncer.poll(ms(5000)), None);
    }

    #[test]
    fn cancel_drops_pending_payload() {
        let mut debouncer = Debouncer::new(ms(300));
        debouncer.schedule(ms(10), 1);
        assert!(debouncer.is_pending());
        debouncer.cancel();
        assert_eq!(debouncer.poll(ms(1000)), None);
    }
}
