//! Identifier generation for peers, sessions and topics
//!
//! Every draw comes from the operating system CSPRNG. Session and topic ids
//! live in small spaces (10 and 22 bits), so collisions are tracked per
//! generator and generation is bounded: a few random draws, then a linear
//! probe from a random offset, then [`IdError::Exhausted`].

use std::collections::HashSet;

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use crate::error::IdError;

/// Number of distinct session ids (10 bits)
pub const SESSION_ID_SPACE: u64 = 1 << 10;

/// Number of distinct topic ids (22 bits)
pub const TOPIC_ID_SPACE: u64 = 1 << 22;

/// Random draws attempted before falling back to a probe
pub const DEFAULT_MAX_RANDOM_ATTEMPTS: u32 = 32;

/// Fresh random 64-bit channel identifier
pub fn random_channel_id() -> u64 {
    OsRng.next_u64()
}

/// Per-channel identifier generator
#[derive(Debug, Clone)]
pub struct IdGenerator {
    channel_id: u64,
    used_session_ids: HashSet<u64>,
    used_topic_ids: HashSet<u64>,
    max_random_attempts: u32,
}

impl IdGenerator {
    pub fn new(channel_id: u64) -> Self {
        Self::with_max_attempts(channel_id, DEFAULT_MAX_RANDOM_ATTEMPTS)
    }

    pub fn with_max_attempts(channel_id: u64, max_random_attempts: u32) -> Self {
        Self {
            channel_id,
            used_session_ids: HashSet::new(),
            used_topic_ids: HashSet::new(),
            max_random_attempts,
        }
    }

    /// Generator for a fresh random channel id
    pub fn random() -> Self {
        Self::new(random_channel_id())
    }

    pub fn channel_id(&self) -> u64 {
        self.channel_id
    }

    /// 128-bit peer id: channel id in the high half, fresh randomness in the
    /// low half. Not checked for collisions.
    pub fn generate_peer_id(&self) -> u128 {
        ((self.channel_id as u128) << 64) | OsRng.next_u64() as u128
    }

    /// Unique session id in `[0, 1024)`
    pub fn generate_session_id(&mut self) -> Result<u64, IdError> {
        draw_unique(
            &mut self.used_session_ids,
            SESSION_ID_SPACE,
            self.max_random_attempts,
            "session",
        )
    }

    /// Unique topic id in `[0, 4194304)`
    pub fn generate_topic_id(&mut self) -> Result<u64, IdError> {
        draw_unique(
            &mut self.used_topic_ids,
            TOPIC_ID_SPACE,
            self.max_random_attempts,
            "topic",
        )
    }

    /// Mark a session id as issued. Returns false if it already was.
    pub fn reserve_session_id(&mut self, id: u64) -> bool {
        self.used_session_ids.insert(id)
    }
}

fn draw_unique(
    used: &mut HashSet<u64>,
    space: u64,
    max_random_attempts: u32,
    kind: &'static str,
) -> Result<u64, IdError> {
    if used.len() as u64 >= space {
        return Err(IdError::Exhausted { kind, space });
    }

    for _ in 0..max_random_attempts {
        let candidate = OsRng.gen_range(0..space);
        if used.insert(candidate) {
            return Ok(candidate);
        }
    }

    let start = OsRng.gen_range(0..space);
    let candidate = (0..space)
        .map(|offset| (start + offset) % space)
        .find(|candidate| !used.contains(candidate))
        .ok_or(IdError::Exhausted { kind, space })?;
    used.insert(candidate);
    Ok(candidate)
}
