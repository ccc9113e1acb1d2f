use std::collections::HashMap;

use derive_getters::Getters;
use thiserror::Error;

use crate::algorithm::event::{self, EventWrapper};
use crate::algorithm::CreatorSeq;
use crate::PeerId;

use self::fork_tracking::ForkIndex;
use super::sequence::CreatorIndex;
use super::EventIndex;

pub mod fork_tracking;

pub type PeerIndex = HashMap<PeerId, PeerIndexEntry>;

#[derive(Getters)]
pub struct PeerIndexEntry {
    /// Slot of the peer in sequence vectors
    creator_index: CreatorIndex,
    /// Events of the peer without self parent. Honest peers have exactly one.
    origins: Vec<event::Hash>,
    authored_events: EventIndex<()>,
    /// Forks authored by the peer that we've observed. Forks are events
    /// that have the same `self_parent` (or no self parent at all).
    fork_index: ForkIndex,
    /// The first known event with the highest creator sequence number
    latest_event: event::Hash,
    latest_seq: CreatorSeq,
}

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("Attempted to add an event that is already present in the index")]
    EventAlreadyKnown,
}

impl PeerIndexEntry {
    pub fn new(creator_index: CreatorIndex, genesis: event::Hash) -> Self {
        Self {
            creator_index,
            origins: vec![genesis.clone()],
            authored_events: HashMap::from([(genesis.clone(), ())]),
            fork_index: ForkIndex::new(),
            latest_event: genesis,
            latest_seq: 0,
        }
    }

    pub fn is_forked(&self) -> bool {
        !self.fork_index.is_empty()
    }

    /// Track one more event without self parent.
    ///
    /// Returns `true` since it is always a fork.
    pub fn add_origin(&mut self, event: event::Hash) -> Result<bool, Error> {
        if self.authored_events.contains_key(&event) {
            return Err(Error::EventAlreadyKnown);
        }
        self.origins.push(event.clone());
        self.fork_index.track_origin_fork(&self.origins);
        self.authored_events.insert(event, ());
        Ok(true)
    }

    /// Track event `event` with sequence number `seq` on top of `self_parent`.
    /// `self_parent` must already list `event` among its self children.
    ///
    /// Returns `true` if the event forks the peer's lane.
    pub fn add_event(
        &mut self,
        self_parent: &EventWrapper,
        event: event::Hash,
        seq: CreatorSeq,
    ) -> Result<bool, Error> {
        // First do all checks, only then apply changes, to keep the state consistent
        if self.authored_events.contains_key(&event) {
            return Err(Error::EventAlreadyKnown);
        }
        // Consider self children without the newly added event (just in case)
        let parent_self_children: event::SelfChild = self_parent
            .children
            .self_child
            .clone()
            .with_child_removed(&event);
        let forking = match parent_self_children {
            event::SelfChild::HonestParent(None) => false,
            event::SelfChild::HonestParent(Some(_)) | event::SelfChild::ForkingParent(_) => {
                self.fork_index.track_fork(self_parent, event.clone());
                true
            }
        };
        self.authored_events.insert(event.clone(), ());
        if seq > self.latest_seq {
            self.latest_event = event;
            self.latest_seq = seq;
        }
        Ok(forking)
    }
}
