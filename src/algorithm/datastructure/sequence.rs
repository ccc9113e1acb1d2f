//! Per-event sequence vectors.
//!
//! For each event and each creator we remember the highest sequence number of
//! the creator's events among the event's ancestors, and the lowest one among
//! its descendants. With them ancestry of two events is answered by comparing
//! two numbers instead of walking the graph (as long as the creator involved
//! did not fork, see [`super::Graph::ancestor`]).

use std::collections::HashMap;

use derive_getters::Getters;

use crate::algorithm::event;
use crate::algorithm::CreatorSeq;
use crate::PeerId;

/// Slot of a creator in sequence vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CreatorIndex(usize);

impl CreatorIndex {
    pub const fn new(index: usize) -> Self {
        CreatorIndex(index)
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

/// Stable mapping from peers to [`CreatorIndex`]es. Indices are handed out in
/// order of first appearance and never change.
#[derive(Default, Debug, Getters)]
pub struct CreatorRegistry {
    indices: HashMap<PeerId, CreatorIndex>,
    peers: Vec<PeerId>,
}

impl CreatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` for peers never seen before
    pub fn index_of(&self, peer: &PeerId) -> Option<CreatorIndex> {
        self.indices.get(peer).copied()
    }

    pub fn peer(&self, index: CreatorIndex) -> Option<&PeerId> {
        self.peers.get(index.0)
    }

    /// Index of `peer`, allocating a new one if needed
    pub fn register(&mut self, peer: PeerId) -> CreatorIndex {
        if let Some(index) = self.index_of(&peer) {
            return index;
        }
        let index = CreatorIndex(self.peers.len());
        self.peers.push(peer);
        self.indices.insert(peer, index);
        index
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Sequence number reached on a creator's lane together with the event
/// that reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontier {
    pub seq: CreatorSeq,
    pub event: event::Hash,
}

/// Sparse vectors: a missing entry means "no ancestor" for `last_ancestors`
/// and "no descendant" for `first_descendants`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceVectors {
    last_ancestors: HashMap<CreatorIndex, Frontier>,
    first_descendants: HashMap<CreatorIndex, Frontier>,
}

impl SequenceVectors {
    /// Vectors of a newly inserted event. `last_ancestors` are final from
    /// now on, `first_descendants` only know the event itself.
    pub fn for_new_event<'a>(
        creator: CreatorIndex,
        seq: CreatorSeq,
        hash: &event::Hash,
        parents: impl IntoIterator<Item = &'a SequenceVectors>,
    ) -> Self {
        let mut last_ancestors: HashMap<CreatorIndex, Frontier> = HashMap::new();
        for parent in parents {
            for (index, frontier) in &parent.last_ancestors {
                match last_ancestors.get(index) {
                    Some(known) if known.seq >= frontier.seq => {}
                    _ => {
                        last_ancestors.insert(*index, frontier.clone());
                    }
                }
            }
        }
        let own = Frontier {
            seq,
            event: hash.clone(),
        };
        // A forked creator may reach a higher event of its other branch
        // through other parents
        match last_ancestors.get(&creator) {
            Some(known) if known.seq > seq => {}
            _ => {
                last_ancestors.insert(creator, own.clone());
            }
        }
        Self {
            last_ancestors,
            first_descendants: HashMap::from([(creator, own)]),
        }
    }

    pub fn last_ancestor(&self, creator: CreatorIndex) -> Option<&Frontier> {
        self.last_ancestors.get(&creator)
    }

    pub fn first_descendant(&self, creator: CreatorIndex) -> Option<&Frontier> {
        self.first_descendants.get(&creator)
    }

    /// Record descendant `event` of `creator` with sequence number `seq`.
    ///
    /// Returns `true` if it is lower than anything known before (i.e. the
    /// vector changed and ancestors might need the update too).
    pub fn lower_first_descendant(
        &mut self,
        creator: CreatorIndex,
        seq: CreatorSeq,
        event: &event::Hash,
    ) -> bool {
        match self.first_descendants.get(&creator) {
            Some(known) if known.seq <= seq => false,
            _ => {
                self.first_descendants.insert(
                    creator,
                    Frontier {
                        seq,
                        event: event.clone(),
                    },
                );
                true
            }
        }
    }
}
