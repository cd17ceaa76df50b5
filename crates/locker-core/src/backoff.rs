// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared exponential backoff with jitter, used by the kiosk's gateway client
//! retries and the gateway's command dispatcher retries alike (spec §4.5,
//! §7: "transient I/O ... retried with backoff").

use std::time::Duration;

use rand::Rng;

/// Doubling backoff bounded by `max`, in the style of the teacher's credential
/// refresh loop, with up to 20% jitter added so retrying peers don't lock step.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { current: initial, max }
    }

    /// The delay to sleep before the next attempt, with jitter applied.
    pub fn next_delay(&mut self) -> Duration {
        let jitter_frac: f64 = rand::thread_rng().gen_range(0.0..0.2);
        let jittered = self.current.mul_f64(1.0 + jitter_frac);
        self.current = (self.current * 2).min(self.max);
        jittered
    }

    pub fn reset(&mut self, initial: Duration) {
        self.current = initial;
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
