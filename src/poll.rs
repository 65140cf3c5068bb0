//! Bounded readiness polling.
//!
//! The target site never signals when the interstitial clears or when Coveo
//! has finished rendering results, so both waits are the same primitive: run
//! a cheap page-state check up to N times with a fixed pause in between, and
//! give up quietly when attempts or the request deadline run out.

use std::time::{Duration, Instant};

use tokio::time::sleep;

/// Outcome of one readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    Ready,
    NotYet,
}

/// Request-scoped deadline fixed when the browser session opens.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    end: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            end: Instant::now() + timeout,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.end
    }

    pub fn remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }
}

/// Run `check` up to `max_attempts` times, `interval` apart, stopping early
/// on [`PollResult::Ready`] or when `deadline` runs out.
///
/// Exhausting attempts is not an error: callers proceed best-effort and let
/// the next step fail explicitly if the page truly never loaded.
pub async fn poll_until<F>(
    max_attempts: u32,
    interval: Duration,
    deadline: Deadline,
    mut check: F,
) -> bool
where
    F: FnMut() -> PollResult,
{
    for attempt in 1..=max_attempts {
        if deadline.expired() {
            return false;
        }
        if check() == PollResult::Ready {
            return true;
        }
        if attempt < max_attempts {
            let wait = interval.min(deadline.remaining());
            if wait.is_zero() {
                return false;
            }
            sleep(wait).await;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausts_exactly_max_attempts_when_never_ready() {
        let mut checks = 0;
        let ready = poll_until(
            3,
            Duration::from_millis(1),
            Deadline::after(Duration::from_secs(5)),
            || {
                checks += 1;
                PollResult::NotYet
            },
        )
        .await;
        assert!(!ready);
        assert_eq!(checks, 3);
    }

    #[tokio::test]
    async fn stops_on_first_ready() {
        let mut checks = 0;
        let ready = poll_until(
            10,
            Duration::from_millis(1),
            Deadline::after(Duration::from_secs(5)),
            || {
                checks += 1;
                if checks == 2 {
                    PollResult::Ready
                } else {
                    PollResult::NotYet
                }
            },
        )
        .await;
        assert!(ready);
        assert_eq!(checks, 2);
    }

    #[tokio::test]
    async fn expired_deadline_skips_all_checks() {
        let mut checks = 0;
        let ready = poll_until(
            5,
            Duration::from_millis(1),
            Deadline::after(Duration::ZERO),
            || {
                checks += 1;
                PollResult::Ready
            },
        )
        .await;
        assert!(!ready);
        assert_eq!(checks, 0);
    }
}
