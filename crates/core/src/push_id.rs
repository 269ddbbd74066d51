//! Chronologically ordered, collision-resistant child keys.
//!
//! An id is 20 characters drawn from a 64-symbol alphabet whose ASCII order
//! matches its numeric order: 8 characters encode the creation millisecond,
//! 12 carry randomness. Ids created within the same millisecond increment the
//! random tail, so ids from one generator always sort in creation order.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::time::Clock;

pub const PUSH_CHARS: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

pub const PUSH_ID_LEN: usize = 20;

const TIME_LEN: usize = 8;
const RANDOM_LEN: usize = PUSH_ID_LEN - TIME_LEN;

struct PushState {
    rng: StdRng,
    last_millis: Option<u64>,
    last_random: [u8; RANDOM_LEN],
}

pub struct PushIdGenerator {
    clock: Clock,
    state: Mutex<PushState>,
}

impl PushIdGenerator {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self::with_rng(clock, StdRng::from_os_rng())
    }

    /// Deterministic generator for tests.
    #[must_use]
    pub fn seeded(clock: Clock, seed: u64) -> Self {
        Self::with_rng(clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(clock: Clock, rng: StdRng) -> Self {
        Self {
            clock,
            state: Mutex::new(PushState {
                rng,
                last_millis: None,
                last_random: [0; RANDOM_LEN],
            }),
        }
    }

    /// Produce the next id.
    pub fn next_id(&self) -> String {
        let now = self.clock.now_millis();
        // Poisoning leaves the random tail valid.
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let duplicate = state.last_millis == Some(now);
        state.last_millis = Some(now);

        if !duplicate || !increment(&mut state.last_random) {
            let PushState {
                rng, last_random, ..
            } = &mut *state;
            for slot in last_random.iter_mut() {
                *slot = rng.random_range(0..64);
            }
        }

        let mut out = String::with_capacity(PUSH_ID_LEN);
        out.push_str(&encode_time(now));
        for &idx in &state.last_random {
            out.push(char::from(PUSH_CHARS[usize::from(idx)]));
        }
        out
    }
}

fn encode_time(mut millis: u64) -> String {
    let mut chars = [0_u8; TIME_LEN];
    for slot in chars.iter_mut().rev() {
        // `millis % 64` always fits the alphabet.
        *slot = PUSH_CHARS[(millis % 64) as usize];
        millis /= 64;
    }
    chars.iter().map(|&b| char::from(b)).collect()
}

/// Add one to the random tail in base 64. Returns false on overflow.
fn increment(tail: &mut [u8; RANDOM_LEN]) -> bool {
    for slot in tail.iter_mut().rev() {
        if *slot == 63 {
            *slot = 0;
        } else {
            *slot += 1;
            return true;
        }
    }
    false
}
