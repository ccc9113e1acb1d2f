//! Event DAG of a hashgraph-style consensus: signed events, their storage and
//! the relations (ancestry, self-ancestry, forks, visibility) virtual voting
//! is built upon.

use serde::{Deserialize, Serialize};

pub mod algorithm;
pub mod config;

pub use algorithm::datastructure::{Graph, SharedGraph};
pub use algorithm::event::{Event, Hash};
pub use config::Config;

/// Logical clock of an event, see [`algorithm::event::Event::lamport_time`].
pub type LamportTime = u64;

/// Identity of an event author. It is the ed25519 public key of the peer, so
/// signatures can be checked without any extra lookup.
#[derive(Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Copy)]
pub struct PeerId([u8; 32]);

impl PeerId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        PeerId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<&ed25519_dalek::PublicKey> for PeerId {
    fn from(key: &ed25519_dalek::PublicKey) -> Self {
        PeerId(key.to_bytes())
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode_upper(self.0))
    }
}

impl std::fmt::Debug for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Full keys are unreadable in logs
        write!(f, "PeerId(0x{}..)", hex::encode_upper(&self.0[..4]))
    }
}
