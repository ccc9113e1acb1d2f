//! Transport representation of events.
//!
//! Conversion is lossless: decoding the wire form of an event gives the same
//! event with the same hash. Absent events map to absent wire forms.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{LamportTime, PeerId};

use super::event::{
    Content, Event, ExternalTransaction, Hash, InternalTransaction, Kind, Parents, ParentsError,
    Signature,
};
use super::CreatorSeq;

#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug)]
pub struct WireEvent {
    pub index: u64,
    pub creator: PeerId,
    pub creator_seq: CreatorSeq,
    pub self_parent: Option<Hash>,
    pub other_parents: Vec<Hash>,
    pub lamport_time: LamportTime,
    pub internal_transactions: Vec<InternalTransaction>,
    pub external_transactions: Vec<ExternalTransaction>,
    pub signature: Option<Signature>,
}

#[derive(Error, Debug)]
pub enum WireError {
    #[error(transparent)]
    InvalidParents(#[from] ParentsError),
    #[error("Encoding failed")]
    Codec(#[from] bincode::Error),
}

impl From<&Event> for WireEvent {
    fn from(event: &Event) -> Self {
        let content = event.content();
        WireEvent {
            index: content.index,
            creator: content.creator,
            creator_seq: content.creator_seq,
            self_parent: event.self_parent().cloned(),
            other_parents: event.other_parents().to_vec(),
            lamport_time: content.lamport_time,
            internal_transactions: content.internal_transactions.clone(),
            external_transactions: content.external_transactions.clone(),
            signature: event.signature().cloned(),
        }
    }
}

impl TryFrom<WireEvent> for Event {
    type Error = WireError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let parents = match (wire.self_parent, wire.other_parents.is_empty()) {
            (None, true) => Kind::Genesis,
            (None, false) => return Err(ParentsError::NoSelfParent.into()),
            (Some(self_parent), _) => {
                // Only one order of other parents is valid, otherwise the same
                // event could be sent with many different hashes
                if !wire.other_parents.windows(2).all(|w| w[0] < w[1]) {
                    return Err(ParentsError::OtherParentsNotSorted.into());
                }
                Kind::Regular(Parents {
                    self_parent,
                    other_parents: wire.other_parents,
                })
            }
        };
        let content = Content {
            index: wire.index,
            creator: wire.creator,
            creator_seq: wire.creator_seq,
            parents,
            lamport_time: wire.lamport_time,
            internal_transactions: wire.internal_transactions,
            external_transactions: wire.external_transactions,
        };
        Ok(Event::from_parts(content, wire.signature)?)
    }
}

pub fn to_wire(event: Option<&Event>) -> Option<WireEvent> {
    event.map(WireEvent::from)
}

pub fn from_wire(wire: Option<WireEvent>) -> Result<Option<Event>, WireError> {
    wire.map(Event::try_from).transpose()
}

pub fn encode(event: &Event) -> Result<Vec<u8>, WireError> {
    Ok(bincode::serialize(&WireEvent::from(event))?)
}

pub fn decode(bytes: &[u8]) -> Result<Event, WireError> {
    let wire: WireEvent = bincode::deserialize(bytes)?;
    Event::try_from(wire)
}
