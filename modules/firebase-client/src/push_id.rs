//! Client-side push ids.
//!
//! A push id is 20 characters: 8 encode the creation time in milliseconds,
//! 12 are random. The alphabet is in ASCII order so ids sort by creation time.
//! Ids generated within the same millisecond reuse the previous random suffix
//! incremented by one, keeping them strictly increasing.

use std::sync::{Mutex, PoisonError};

use rand::Rng;

pub const PUSH_CHARS: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

pub const PUSH_ID_LEN: usize = 20;

const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

#[derive(Debug, Default)]
struct State {
    last_ms: i64,
    last_random: [u8; RANDOM_CHARS],
}

#[derive(Debug, Default)]
pub struct PushIdGenerator {
    state: Mutex<State>,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        self.next_id_at(chrono::Utc::now().timestamp_millis())
    }

    /// Generate an id as if the clock read `now_ms`.
    ///
    /// A clock that moves backwards is treated as standing still.
    pub fn next_id_at(&self, now_ms: i64) -> String {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let ms = if now_ms <= state.last_ms {
            increment(&mut state.last_random);
            state.last_ms
        } else {
            let mut rng = rand::rng();
            for slot in state.last_random.iter_mut() {
                *slot = rng.random_range(0..64);
            }
            state.last_ms = now_ms;
            now_ms
        };

        encode(ms, &state.last_random)
    }
}

/// Decode the millisecond timestamp embedded in a push id.
pub fn push_id_timestamp(id: &str) -> Option<i64> {
    if id.len() != PUSH_ID_LEN {
        return None;
    }
    id.bytes().take(TIME_CHARS).try_fold(0i64, |acc, b| {
        let idx = PUSH_CHARS.iter().position(|&c| c == b)?;
        Some(acc * 64 + idx as i64)
    })
}

fn increment(random: &mut [u8; RANDOM_CHARS]) {
    for slot in random.iter_mut().rev() {
        if *slot == 63 {
            *slot = 0;
        } else {
            *slot += 1;
            return;
        }
    }
}

fn encode(ms: i64, random: &[u8; RANDOM_CHARS]) -> String {
    let mut out = [0u8; PUSH_ID_LEN];
    let mut rest = ms.max(0) as u64;
    for slot in out[..TIME_CHARS].iter_mut().rev() {
        *slot = PUSH_CHARS[(rest % 64) as usize];
        rest /= 64;
    }
    for (slot, &r) in out[TIME_CHARS..].iter_mut().zip(random) {
        *slot = PUSH_CHARS[r as usize];
    }
    out.iter().map(|&b| b as char).collect()
}
