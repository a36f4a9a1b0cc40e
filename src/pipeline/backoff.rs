//! Global rate-limit gate shared by the dispatcher and its workers.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// A single monotonic deadline: no probe may be issued before it.
///
/// Kept as one `Option<Instant>` rather than a flag plus a timestamp so
/// "are we resting" and "until when" can never disagree.
pub struct BackoffGate {
    deadline: Mutex<Option<Instant>>,
}

impl BackoffGate {
    pub fn new() -> Self {
        Self {
            deadline: Mutex::new(None),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.deadline.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Extend the rest period. Monotonic: a shorter duration never shortens
    /// an active backoff.
    pub fn engage(&self, period: Duration) {
        let until = Instant::now() + period;
        let mut deadline = self.lock();
        match *deadline {
            Some(current) if current >= until => {}
            _ => *deadline = Some(until),
        }
    }

    /// The deadline, if it is still in the future. An expired deadline is
    /// cleared on the way out.
    pub fn active_until(&self) -> Option<Instant> {
        let mut deadline = self.lock();
        match *deadline {
            Some(until) if until > Instant::now() => Some(until),
            Some(_) => {
                *deadline = None;
                None
            }
            None => None,
        }
    }

    /// Resolve once the gate is open. Immediate when no backoff is active.
    pub async fn ready(&self) {
        while let Some(until) = self.active_until() {
            tokio::time::sleep_until(until).await;
        }
    }
}

impl Default for BackoffGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_gate_is_open() {
        let gate = BackoffGate::new();
        assert!(gate.active_until().is_none());
    }

    #[test]
    fn engage_is_monotonic() {
        let gate = BackoffGate::new();
        gate.engage(Duration::from_secs(10));
        let first = gate.active_until().unwrap();

        // A shorter directive must not shorten the active backoff.
        gate.engage(Duration::from_secs(1));
        assert_eq!(gate.active_until().unwrap(), first);

        // A longer one extends it.
        gate.engage(Duration::from_secs(60));
        assert!(gate.active_until().unwrap() > first);
    }

    #[test]
    fn expired_deadline_clears() {
        let gate = BackoffGate::new();
        gate.engage(Duration::ZERO);
        assert!(gate.active_until().is_none());
    }

    #[tokio::test]
    async fn ready_waits_out_the_deadline() {
        let gate = BackoffGate::new();
        let started = Instant::now();
        gate.engage(Duration::from_millis(50));
        gate.ready().await;
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(gate.active_until().is_none());
    }
}
