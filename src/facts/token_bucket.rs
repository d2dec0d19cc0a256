use core::time::Duration;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

const LOG_TARGET: &str = "    bucket";

/// Shared request budget for every outbound call of a run.
///
/// The bucket holds at most `capacity` tokens and refills continuously so that
/// a full bucket is regenerated over one window. Each request takes one token
/// through [`TokenBucket::acquire`]; callers suspend while the bucket is empty.
///
/// Provider feedback is folded in through [`TokenBucket::observe`] and
/// [`TokenBucket::pause_for`]. When pauses overlap, the longest one wins.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    paused_until: Option<Instant>,
    quota: Option<ProviderQuota>,
}

/// What the provider said is left until its window resets.
#[derive(Debug, Clone, Copy)]
struct ProviderQuota {
    remaining: f64,
    resets_at: Instant,
}

/// Returned by [`TokenBucket::acquire`] when the next token is further away than the caller allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitExceeded {
    /// How long until a token would have been available.
    pub available_in: Duration,
}

impl TokenBucket {
    /// Minimum extension required for a new pause to override an active one.
    const MIN_PAUSE_EXTENSION: Duration = Duration::from_secs(1);

    /// Create a full bucket holding `capacity` tokens, refilled over `window`.
    #[must_use]
    pub fn new(capacity: u32, window: Duration) -> Self {
        let capacity = f64::from(capacity.max(1));
        let window_secs = window.as_secs_f64().max(0.001);

        Self {
            capacity,
            refill_per_sec: capacity / window_secs,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                paused_until: None,
                quota: None,
            }),
        }
    }

    /// Take one token, waiting for it if necessary.
    ///
    /// Fails without waiting when the token would only become available after
    /// `ceiling`. On success, returns how long the caller was suspended.
    pub async fn acquire(&self, ceiling: Duration) -> Result<Duration, WaitExceeded> {
        let mut waited = Duration::ZERO;

        loop {
            let wait = {
                let mut state = self.lock();
                let now = Instant::now();
                self.refill(&mut state, now);

                match state.paused_until {
                    Some(until) if until > now => until - now,
                    _ => {
                        state.paused_until = None;
                        if state.tokens >= 1.0 {
                            state.tokens -= 1.0;
                            if let Some(quota) = &mut state.quota {
                                quota.remaining = (quota.remaining - 1.0).max(0.0);
                            }
                            return Ok(waited);
                        }

                        let refill_wait = Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec);
                        match state.quota {
                            Some(quota) if quota.remaining < 1.0 => quota.resets_at.saturating_duration_since(now).max(refill_wait),
                            _ => refill_wait,
                        }
                    }
                }
            };

            if waited + wait > ceiling {
                return Err(WaitExceeded { available_in: wait });
            }

            log::trace!(target: LOG_TARGET, "Waiting {}ms for a request token", wait.as_millis());
            tokio::time::sleep(wait).await;
            waited += wait;
        }
    }

    /// Reconcile the local budget with the provider's view of the quota.
    ///
    /// Until `resets_in` has elapsed, the bucket hands out at most `remaining`
    /// tokens no matter how much it refills. A `remaining` of zero also pauses
    /// the bucket until the reset.
    pub fn observe(&self, remaining: u32, resets_in: Duration) {
        {
            let mut state = self.lock();
            let now = Instant::now();
            state.quota = Some(ProviderQuota {
                remaining: f64::from(remaining),
                resets_at: now + resets_in,
            });
            self.refill(&mut state, now);
        }

        if remaining == 0 && self.pause_for(resets_in) {
            log::debug!(target: LOG_TARGET, "Provider quota exhausted, pausing for {}s", resets_in.as_secs());
        }
    }

    /// Stop handing out tokens for `duration`.
    ///
    /// If a pause with a similar or longer duration is already active, this call
    /// is a no-op and returns `false`.
    pub fn pause_for(&self, duration: Duration) -> bool {
        let mut state = self.lock();
        let resume_at = Instant::now() + duration;

        if state
            .paused_until
            .is_some_and(|existing| existing + Self::MIN_PAUSE_EXTENSION >= resume_at)
        {
            return false;
        }

        state.paused_until = Some(resume_at);
        true
    }

    /// Tokens currently available, after refilling.
    #[must_use]
    pub fn available(&self) -> f64 {
        let mut state = self.lock();
        self.refill(&mut state, Instant::now());
        state.tokens
    }

    /// Whether a pause is currently in effect.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.lock().paused_until.is_some_and(|until| until > Instant::now())
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = elapsed.mul_add(self.refill_per_sec, state.tokens).min(self.capacity);
        state.last_refill = now;

        match state.quota {
            Some(quota) if quota.resets_at > now => state.tokens = state.tokens.min(quota.remaining),
            Some(_) => state.quota = None,
            None => {}
        }
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
