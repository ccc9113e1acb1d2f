use thiserror::Error;

use crate::PeerId;

use self::event::{Hash, ParentsError, Signature};

pub mod datastructure;
pub mod event;
pub mod ingress;
pub mod relay;
pub mod wire;

/// Sequence number of an event in its creator's chain
pub type CreatorSeq = u64;

/// Something able to sign events on behalf of a single peer.
pub trait Signer {
    /// Peer the signatures are made for.
    fn identity(&self) -> PeerId;

    fn sign(&self, event_hash: &Hash) -> Result<Signature, SignError>;
}

impl Signer for ed25519_dalek::Keypair {
    fn identity(&self) -> PeerId {
        PeerId::from(&self.public)
    }

    fn sign(&self, event_hash: &Hash) -> Result<Signature, SignError> {
        let signature = ed25519_dalek::Signer::try_sign(self, event_hash.as_ref())
            .map_err(|e| SignError::SigningFailed(e.to_string()))?;
        Ok(Signature::from(signature))
    }
}

/// Deterministic keypair from 32 secret bytes.
pub fn keypair_from_secret(
    secret: [u8; 32],
) -> Result<ed25519_dalek::Keypair, ed25519_dalek::SignatureError> {
    let secret = ed25519_dalek::SecretKey::from_bytes(&secret)?;
    let public = ed25519_dalek::PublicKey::from(&secret);
    Ok(ed25519_dalek::Keypair { secret, public })
}

#[derive(Error, Debug, PartialEq)]
pub enum SignError {
    #[error("Signing failed: {0}")]
    SigningFailed(String),
    /// `(signer, creator)`
    #[error("Key of {0} cannot sign events created by {1}")]
    ForeignKey(PeerId, PeerId),
}

#[derive(Error, Debug, PartialEq)]
pub enum PushError {
    #[error("Could not find specified parent in the graph. Parent hash: `{0}`")]
    MissingParent(event::Hash),
    /// `(expected, provided)`
    #[error("Provided author is different from author of self parent (expected {0}, provided {1})")]
    IncorrectAuthor(PeerId, PeerId),
    #[error("Creator sequence number does not follow the self parent (expected {expected}, provided {provided})")]
    InvalidCreatorSeq {
        expected: CreatorSeq,
        provided: CreatorSeq,
    },
    #[error("Event index does not follow the self parent (expected {expected}, provided {provided})")]
    InvalidIndex { expected: u64, provided: u64 },
    #[error("Lamport time is inconsistent with parents (expected {expected}, provided {provided})")]
    InvalidLamportTime {
        expected: crate::LamportTime,
        provided: crate::LamportTime,
    },
    /// `(provided, allowed)`
    #[error("Event has {0} other parents while at most {1} are allowed")]
    TooManyOtherParents(usize, usize),
    #[error(transparent)]
    InvalidParents(#[from] ParentsError),
}

/// Successful result of pushing an event into the graph.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum InsertOutcome {
    Inserted,
    /// The event was tracked before, nothing changed. Gossip retransmits
    /// events all the time, so it is not an error.
    AlreadyKnown,
}
