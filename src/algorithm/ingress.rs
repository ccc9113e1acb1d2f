//! Entry point for events coming from the network.
//!
//! Gossip does not guarantee that parents arrive before children, so events
//! with unknown parents wait here until the parent shows up.

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use super::datastructure::SharedGraph;
use super::event::{Event, Hash};
use super::wire::{self, WireError};
use super::{InsertOutcome, PushError};
use crate::Config;

#[derive(Error, Debug)]
pub enum IngressError {
    #[error("Signature of event {0} does not match its creator")]
    VerificationFailed(Hash),
    #[error("Too many events wait for their parents ({0}), event {1} dropped")]
    OrphanBufferFull(usize, Hash),
    #[error("Could not decode the event")]
    Malformed(#[from] WireError),
    #[error(transparent)]
    Push(#[from] PushError),
}

pub struct Ingress {
    graph: SharedGraph,
    verify_signatures: bool,
    max_orphans: usize,
    /// Missing parent -> events waiting for it
    orphans: HashMap<Hash, Vec<Event>>,
    buffered: HashSet<Hash>,
}

impl Ingress {
    pub fn new(graph: SharedGraph, config: &Config) -> Self {
        Self {
            graph,
            verify_signatures: config.verify_signatures,
            max_orphans: config.max_orphans,
            orphans: HashMap::new(),
            buffered: HashSet::new(),
        }
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// Number of events waiting for parents
    pub fn orphan_count(&self) -> usize {
        self.buffered.len()
    }

    pub fn is_buffered(&self, hash: &Hash) -> bool {
        self.buffered.contains(hash)
    }

    /// Decode and [receive](Self::receive) the event.
    pub fn receive_wire(&mut self, bytes: &[u8]) -> Result<Vec<Hash>, IngressError> {
        let event = wire::decode(bytes)?;
        self.receive(event)
    }

    /// Insert the event into the graph, buffering it if some parent is not
    /// known yet.
    ///
    /// Returns hashes of all events inserted as a result, in insertion
    /// order: the event itself followed by released orphans. Empty if the
    /// event was known already or got buffered.
    #[instrument(level = "debug", skip_all, fields(event = %event.hash()))]
    pub fn receive(&mut self, event: Event) -> Result<Vec<Hash>, IngressError> {
        if self.verify_signatures && !event.verify_by_creator() {
            warn!("Dropping event with invalid signature, creator {}", event.creator());
            return Err(IngressError::VerificationFailed(event.hash().clone()));
        }
        if self.buffered.contains(event.hash()) {
            trace!("Event is already waiting for parents");
            return Ok(vec![]);
        }
        let hash = event.hash().clone();
        match self.graph.insert(event.clone()) {
            Ok(InsertOutcome::Inserted) => {
                let mut inserted = vec![hash.clone()];
                self.release_orphans(hash, &mut inserted);
                Ok(inserted)
            }
            Ok(InsertOutcome::AlreadyKnown) => Ok(vec![]),
            Err(PushError::MissingParent(parent)) => {
                if self.buffered.len() >= self.max_orphans {
                    warn!("Orphan buffer is full, dropping event");
                    return Err(IngressError::OrphanBufferFull(self.max_orphans, hash));
                }
                debug!("Parent {} is unknown, buffering the event", parent);
                self.buffer(parent, event);
                Ok(vec![])
            }
            Err(e) => {
                warn!("Rejected event: {}", e);
                Err(e.into())
            }
        }
    }

    fn buffer(&mut self, missing_parent: Hash, event: Event) {
        self.buffered.insert(event.hash().clone());
        self.orphans.entry(missing_parent).or_default().push(event);
    }

    /// Insert all buffered events that were waiting for `parent` (directly
    /// or not).
    fn release_orphans(&mut self, parent: Hash, inserted: &mut Vec<Hash>) {
        let mut arrived = VecDeque::from([parent]);
        while let Some(next) = arrived.pop_front() {
            let waiting = match self.orphans.remove(&next) {
                Some(w) => w,
                None => continue,
            };
            trace!("Releasing {} events waiting for {}", waiting.len(), next);
            for orphan in waiting {
                let hash = orphan.hash().clone();
                self.buffered.remove(&hash);
                match self.graph.insert(orphan.clone()) {
                    Ok(InsertOutcome::Inserted) => {
                        inserted.push(hash.clone());
                        arrived.push_back(hash);
                    }
                    Ok(InsertOutcome::AlreadyKnown) => (),
                    Err(PushError::MissingParent(other)) => {
                        trace!("Event {} still misses {}", hash, other);
                        self.buffer(other, orphan);
                    }
                    Err(e) => warn!("Dropping buffered event {}: {}", hash, e),
                }
            }
        }
    }
}
