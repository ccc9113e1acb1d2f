use blake2::{Blake2b512, Digest};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;
use thiserror::Error;

use crate::{LamportTime, PeerId};

use super::datastructure::sequence::SequenceVectors;
use super::{CreatorSeq, SignError, Signer};

// smth like H512 (some hash type)
#[derive(Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash, Clone)]
pub struct Hash {
    #[serde(with = "BigArray")]
    inner: [u8; 64],
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode_upper(self.inner))
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hash")
            .field("hex_value", &format!("{self}"))
            .finish()
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

impl Hash {
    pub fn into_array(self) -> [u8; 64] {
        self.inner
    }

    pub const fn from_array(inner: [u8; 64]) -> Self {
        Hash { inner }
    }

    /// Blake2b-512 digest of `bytes`
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(bytes);
        let mut inner = [0u8; 64];
        inner.copy_from_slice(&hasher.finalize()[..]);
        Hash { inner }
    }
}

/// ed25519 signature of an event hash
#[derive(Serialize, Deserialize, Eq, PartialEq, Hash, Clone)]
pub struct Signature(#[serde(with = "BigArray")] [u8; 64]);

impl Signature {
    pub const fn from_array(inner: [u8; 64]) -> Self {
        Signature(inner)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Fails on byte strings that cannot be an ed25519 signature at all.
    pub fn to_dalek(&self) -> Result<ed25519_dalek::Signature, ed25519_dalek::SignatureError> {
        ed25519_dalek::Signature::try_from(&self.0[..])
    }
}

impl From<ed25519_dalek::Signature> for Signature {
    fn from(value: ed25519_dalek::Signature) -> Self {
        let mut inner = [0u8; 64];
        inner.copy_from_slice(value.as_ref());
        Signature(inner)
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0[..8]))
    }
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Hash, Clone, Debug)]
pub struct InternalTransaction {
    /// Position among transactions of the creator
    pub index: u64,
    pub amount: u64,
    pub receiver: PeerId,
}

/// Opaque payload, the graph never looks inside
pub type ExternalTransaction = Vec<u8>;

#[derive(Serialize, Deserialize, Eq, PartialEq, Hash, Clone, Debug, Default)]
pub struct Transactions {
    pub internal: Vec<InternalTransaction>,
    pub external: Vec<ExternalTransaction>,
}

/// Identifier of an internal transaction: hash of its creator and index.
pub fn transaction_hash_of(creator: &PeerId, index: u64) -> Hash {
    let mut bytes = Vec::with_capacity(40);
    bytes.extend_from_slice(creator.as_bytes());
    bytes.extend_from_slice(&index.to_le_bytes());
    Hash::of(&bytes)
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Hash, Clone, Debug)]
pub struct Parents {
    pub self_parent: Hash,
    /// Sorted, each authored by a different peer
    pub other_parents: Vec<Hash>,
}

impl Parents {
    /// Self parent first, then other parents
    pub fn iter(&self) -> impl Iterator<Item = &Hash> {
        std::iter::once(&self.self_parent).chain(self.other_parents.iter())
    }
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Hash, Clone, Debug)]
pub enum Kind {
    Genesis,
    Regular(Parents),
}

impl Kind {
    pub fn parents(&self) -> impl Iterator<Item = &Hash> {
        match self {
            Kind::Genesis => None,
            Kind::Regular(parents) => Some(parents.iter()),
        }
        .into_iter()
        .flatten()
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ParentsError {
    #[error("An event can have only one self parent")]
    SeveralSelfParents,
    #[error("An event with parents must have a self parent")]
    NoSelfParent,
    #[error("Other parents must be authored by distinct peers, {0} appears twice")]
    DuplicateOtherParentAuthor(PeerId),
    #[error("Other parent {0} is authored by the event creator")]
    OtherParentBySelf(Hash),
    #[error("Other parents must be listed in ascending order without repetitions")]
    OtherParentsNotSorted,
}

#[derive(Error, Debug)]
pub enum EventError {
    #[error(transparent)]
    InvalidParents(#[from] ParentsError),
    #[error("Serialization failed")]
    SerializationFailure(#[from] bincode::Error),
}

/// Fields covered by the event hash (i.e. everything except the signature).
#[derive(Serialize, Deserialize, Eq, PartialEq, Hash, Clone, Debug)]
pub(crate) struct Content {
    pub(crate) index: u64,
    pub(crate) creator: PeerId,
    pub(crate) creator_seq: CreatorSeq,
    pub(crate) parents: Kind,
    pub(crate) lamport_time: LamportTime,
    pub(crate) internal_transactions: Vec<InternalTransaction>,
    pub(crate) external_transactions: Vec<ExternalTransaction>,
}

/// Immutable graph event. The hash is calculated once on creation and stays
/// the same whatever happens to the signature.
#[derive(Eq, PartialEq, Clone, Debug)]
pub struct Event {
    content: Content,
    signature: Option<Signature>,
    hash: Hash,
}

impl Event {
    /// Create unsigned event of `creator` on top of `parents`.
    ///
    /// Self parent is the parent authored by `creator`, the rest are other
    /// parents. Empty `parents` give a genesis event.
    pub fn new(
        transactions: Transactions,
        parents: &[&Event],
        creator: PeerId,
    ) -> Result<Self, EventError> {
        let (self_parents, other_parents): (Vec<&Event>, Vec<&Event>) =
            parents.iter().copied().partition(|p| p.creator() == &creator);
        if self_parents.len() > 1 {
            return Err(ParentsError::SeveralSelfParents.into());
        }
        if let Some(author) = other_parents.iter().map(|p| p.creator()).duplicates().next() {
            return Err(ParentsError::DuplicateOtherParentAuthor(*author).into());
        }
        let lamport_time = parents
            .iter()
            .map(|p| p.lamport_time())
            .max()
            .map_or(0, |t| t + 1);
        let (kind, index, creator_seq) = match self_parents.first() {
            None if other_parents.is_empty() => (Kind::Genesis, 0, 0),
            None => return Err(ParentsError::NoSelfParent.into()),
            Some(self_parent) => {
                let other_parents = other_parents
                    .iter()
                    .map(|p| p.hash().clone())
                    .sorted()
                    .collect();
                let kind = Kind::Regular(Parents {
                    self_parent: self_parent.hash().clone(),
                    other_parents,
                });
                (kind, self_parent.index() + 1, self_parent.creator_seq() + 1)
            }
        };
        let content = Content {
            index,
            creator,
            creator_seq,
            parents: kind,
            lamport_time,
            internal_transactions: transactions.internal,
            external_transactions: transactions.external,
        };
        Ok(Self::from_parts(content, None)?)
    }

    pub(crate) fn from_parts(content: Content, signature: Option<Signature>) -> bincode::Result<Self> {
        let hash = Hash::of(&bincode::serialize(&content)?);
        Ok(Event {
            content,
            signature,
            hash,
        })
    }

    pub(crate) fn content(&self) -> &Content {
        &self.content
    }

    /// Sign the event hash. Signing again replaces the previous signature.
    pub fn sign<S: Signer>(&mut self, signer: &S) -> Result<Signature, SignError> {
        let identity = signer.identity();
        if identity != self.content.creator {
            return Err(SignError::ForeignKey(identity, self.content.creator));
        }
        let signature = signer.sign(&self.hash)?;
        self.signature = Some(signature.clone());
        Ok(signature)
    }

    /// `false` for unsigned events and anything not verifiable, never panics.
    pub fn verify(&self, public_key: &ed25519_dalek::PublicKey) -> bool {
        let signature = match &self.signature {
            Some(s) => s,
            None => return false,
        };
        match signature.to_dalek() {
            Ok(signature) => {
                ed25519_dalek::Verifier::verify(public_key, self.hash.as_ref(), &signature).is_ok()
            }
            Err(_) => false,
        }
    }

    /// [`Self::verify`] with the key taken from the creator identity.
    pub fn verify_by_creator(&self) -> bool {
        match ed25519_dalek::PublicKey::from_bytes(self.content.creator.as_bytes()) {
            Ok(key) => self.verify(&key),
            Err(_) => false,
        }
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn index(&self) -> u64 {
        self.content.index
    }

    pub fn creator(&self) -> &PeerId {
        &self.content.creator
    }

    pub fn creator_seq(&self) -> CreatorSeq {
        self.content.creator_seq
    }

    pub fn parents(&self) -> &Kind {
        &self.content.parents
    }

    pub fn lamport_time(&self) -> LamportTime {
        self.content.lamport_time
    }

    pub fn internal_transactions(&self) -> &[InternalTransaction] {
        &self.content.internal_transactions
    }

    pub fn external_transactions(&self) -> &[ExternalTransaction] {
        &self.content.external_transactions
    }

    pub fn self_parent(&self) -> Option<&Hash> {
        match &self.content.parents {
            Kind::Genesis => None,
            Kind::Regular(p) => Some(&p.self_parent),
        }
    }

    /// Sorted other parents
    pub fn other_parents(&self) -> &[Hash] {
        match &self.content.parents {
            Kind::Genesis => &[],
            Kind::Regular(p) => &p.other_parents,
        }
    }

    pub fn find_internal_transaction(&self, id: &Hash) -> Option<&InternalTransaction> {
        self.content
            .internal_transactions
            .iter()
            .find(|tx| &transaction_hash_of(&self.content.creator, tx.index) == id)
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Event{{{}, [{}], t={}}}",
            self.hash,
            self.content.parents.parents().join(", "),
            self.content.lamport_time
        )
    }
}

/// Graph event with additional metadata for navigation etc.
#[derive(Clone, Debug)]
pub struct EventWrapper {
    // parents are inside the event, as geneses do not have ones
    pub children: Children,
    pub(crate) vectors: SequenceVectors,
    inner: Event,
}

impl EventWrapper {
    pub fn new(inner: Event) -> Self {
        EventWrapper {
            children: Children {
                self_child: SelfChild::HonestParent(None),
                other_children: vec![],
            },
            vectors: SequenceVectors::default(),
            inner,
        }
    }

    pub(crate) fn with_vectors(inner: Event, vectors: SequenceVectors) -> Self {
        let mut wrapper = Self::new(inner);
        wrapper.vectors = vectors;
        wrapper
    }

    pub fn inner(&self) -> &Event {
        &self.inner
    }
}

impl std::ops::Deref for EventWrapper {
    type Target = Event;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Eq, PartialEq, Hash, Clone, Debug)]
pub struct Children {
    // Child(-ren in case of forks) with the same author
    pub self_child: SelfChild,
    // Children created by different peers
    pub other_children: Vec<Hash>,
}

impl From<Children> for Vec<Hash> {
    fn from(value: Children) -> Self {
        let mut result: Vec<_> = value.self_child.into();
        result.extend(value.other_children);
        result
    }
}

#[derive(Eq, PartialEq, Hash, Clone, Debug)]
pub enum SelfChild {
    HonestParent(Option<Hash>),
    ForkingParent(Vec<Hash>),
}

impl SelfChild {
    /// Returns `true` if the parent became dishonest/forking
    pub fn add_child(&mut self, child: Hash) -> bool {
        // guilty until proven innocent lol :)
        let mut dishonesty = true;
        match self {
            SelfChild::HonestParent(self_child_entry) => {
                let new_val = match self_child_entry {
                    None => {
                        dishonesty = false;
                        Self::HonestParent(Some(child))
                    }
                    Some(child_2) => Self::ForkingParent(vec![child_2.clone(), child]),
                };
                *self = new_val;
            }
            SelfChild::ForkingParent(children) => children.push(child),
        };
        dishonesty
    }

    pub fn with_child_removed(self, child: &Hash) -> Self {
        let self_children_vec: Vec<_> = self.into();
        self_children_vec
            .into_iter()
            .filter(|h| h != child)
            .collect::<Vec<_>>()
            .into()
    }
}

impl From<SelfChild> for Vec<Hash> {
    fn from(value: SelfChild) -> Self {
        match value {
            SelfChild::HonestParent(child_opt) => child_opt.into_iter().collect(),
            SelfChild::ForkingParent(children_list) => children_list,
        }
    }
}

impl From<Vec<Hash>> for SelfChild {
    fn from(mut value: Vec<Hash>) -> Self {
        match value.len() {
            0 | 1 => Self::HonestParent(value.pop()),
            _ => Self::ForkingParent(value),
        }
    }
}
