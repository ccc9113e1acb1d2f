use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use self::peer_index::{PeerIndex, PeerIndexEntry};
use self::sequence::{CreatorIndex, CreatorRegistry, Frontier, SequenceVectors};
use super::event::{self, Event, EventWrapper, Kind, ParentsError};
use super::{CreatorSeq, InsertOutcome, PushError};
use crate::{Config, LamportTime, PeerId};

pub use self::shared::SharedGraph;

mod peer_index;
pub mod sequence;
mod shared;

pub type EventIndex<T> = HashMap<event::Hash, T>;

#[derive(Error, Debug, PartialEq)]
#[error("Event with such hash is unknown to the graph (hash {0})")]
pub struct UnknownEvent(pub event::Hash);

/// Store of all known events and the relations between them.
///
/// Events are only ever added. Each insertion computes the sequence vectors of
/// the new event and lowers `first_descendants` of its ancestors, so the
/// relation queries mostly compare numbers instead of walking the graph.
pub struct Graph {
    all_events: EventIndex<EventWrapper>,
    peer_index: PeerIndex,
    creators: CreatorRegistry,
    max_other_parents: Option<usize>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            all_events: HashMap::new(),
            peer_index: HashMap::new(),
            creators: CreatorRegistry::new(),
            max_other_parents: config.max_other_parents,
        }
    }

    /// Add event to the graph.
    ///
    /// All parents must be known already. Inserting a known event changes
    /// nothing and reports [`InsertOutcome::AlreadyKnown`].
    #[instrument(level = "debug", skip_all, fields(event = %event.hash()))]
    pub fn insert(&mut self, event: Event) -> Result<InsertOutcome, PushError> {
        trace!("Testing if event is already known");
        if self.all_events.contains_key(event.hash()) {
            debug!("Event is already known, ignoring");
            return Ok(InsertOutcome::AlreadyKnown);
        }

        // Verification first, no changing state
        debug!("Validating the event");
        self.validate(&event)?;

        debug!("The event is valid, updating state to include it");
        let hash = event.hash().clone();
        let creator = *event.creator();
        let seq = event.creator_seq();
        let creator_index = self.creators.register(creator);

        trace!("Calculating sequence vectors");
        let vectors = SequenceVectors::for_new_event(
            creator_index,
            seq,
            &hash,
            event.parents().parents().map(|p| {
                &self
                    .all_events
                    .get(p)
                    .expect("Just checked parents presence")
                    .vectors
            }),
        );

        trace!("Updating pointers of parents and peer index");
        match event.parents() {
            Kind::Genesis => match self.peer_index.get_mut(&creator) {
                None => {
                    self.peer_index
                        .insert(creator, PeerIndexEntry::new(creator_index, hash.clone()));
                }
                Some(author_index) => {
                    warn!("Peer {} created another event without self parent", creator);
                    if let Err(e) = author_index.add_origin(hash.clone()) {
                        warn!("Peer index insertion error: {}", e);
                    }
                }
            },
            Kind::Regular(parents) => {
                let self_parent_event = self
                    .all_events
                    .get_mut(&parents.self_parent)
                    .expect("Just checked self parent presence");
                self_parent_event.children.self_child.add_child(hash.clone());
                let author_index = self
                    .peer_index
                    .get_mut(&creator)
                    .expect("Author of known self parent must be indexed");
                match author_index.add_event(self_parent_event, hash.clone(), seq) {
                    Ok(true) => warn!(
                        "Peer {} forked: {} is not the only self child of {}",
                        creator, hash, parents.self_parent
                    ),
                    Ok(false) => (),
                    Err(e) => warn!("Peer index insertion error: {}", e),
                }
                for other_parent in &parents.other_parents {
                    self.all_events
                        .get_mut(other_parent)
                        .expect("Just checked other parent presence")
                        .children
                        .other_children
                        .push(hash.clone());
                }
            }
        }

        trace!("Tracking the event");
        self.all_events
            .insert(hash.clone(), EventWrapper::with_vectors(event, vectors));

        trace!("Propagating the event to first descendants of its ancestors");
        self.propagate_first_descendant(&hash, creator_index, seq);
        Ok(InsertOutcome::Inserted)
    }

    fn validate(&self, event: &Event) -> Result<(), PushError> {
        let parents = match event.parents() {
            Kind::Genesis => {
                trace!("It is a genesis event");
                if event.creator_seq() != 0 {
                    return Err(PushError::InvalidCreatorSeq {
                        expected: 0,
                        provided: event.creator_seq(),
                    });
                }
                if event.index() != 0 {
                    return Err(PushError::InvalidIndex {
                        expected: 0,
                        provided: event.index(),
                    });
                }
                if event.lamport_time() != 0 {
                    return Err(PushError::InvalidLamportTime {
                        expected: 0,
                        provided: event.lamport_time(),
                    });
                }
                return Ok(());
            }
            Kind::Regular(parents) => parents,
        };
        trace!("It is a regular event");
        trace!("Checking presence of parents");
        let mut max_parent_time: LamportTime = 0;
        for parent in parents.iter() {
            let parent_event = self
                .all_events
                .get(parent)
                .ok_or_else(|| PushError::MissingParent(parent.clone()))?;
            max_parent_time = max_parent_time.max(parent_event.lamport_time());
        }

        trace!("Author validation with self parent");
        let self_parent = self
            .all_events
            .get(&parents.self_parent)
            .expect("Just checked parents presence");
        if self_parent.creator() != event.creator() {
            debug!(
                "Specified self parent author ({}) differs from provided one ({})",
                self_parent.creator(),
                event.creator()
            );
            return Err(PushError::IncorrectAuthor(
                *self_parent.creator(),
                *event.creator(),
            ));
        }
        if event.creator_seq() != self_parent.creator_seq() + 1 {
            return Err(PushError::InvalidCreatorSeq {
                expected: self_parent.creator_seq() + 1,
                provided: event.creator_seq(),
            });
        }
        if event.index() != self_parent.index() + 1 {
            return Err(PushError::InvalidIndex {
                expected: self_parent.index() + 1,
                provided: event.index(),
            });
        }

        trace!("Other parents validation");
        if let Some(max) = self.max_other_parents {
            if parents.other_parents.len() > max {
                return Err(PushError::TooManyOtherParents(
                    parents.other_parents.len(),
                    max,
                ));
            }
        }
        let mut other_authors = HashSet::with_capacity(parents.other_parents.len());
        for other_parent in &parents.other_parents {
            let other_author = self
                .all_events
                .get(other_parent)
                .expect("Just checked parents presence")
                .creator();
            if other_author == event.creator() {
                return Err(ParentsError::OtherParentBySelf(other_parent.clone()).into());
            }
            if !other_authors.insert(other_author) {
                return Err(ParentsError::DuplicateOtherParentAuthor(*other_author).into());
            }
        }

        if event.lamport_time() != max_parent_time + 1 {
            return Err(PushError::InvalidLamportTime {
                expected: max_parent_time + 1,
                provided: event.lamport_time(),
            });
        }
        Ok(())
    }

    /// Lower `first_descendants[creator]` of all ancestors of `origin` to
    /// `seq`. An ancestor that already has a value at most `seq` stops the
    /// walk: its own ancestors were updated by that earlier descendant.
    fn propagate_first_descendant(
        &mut self,
        origin: &event::Hash,
        creator: CreatorIndex,
        seq: CreatorSeq,
    ) {
        let mut queue: VecDeque<event::Hash> = self
            .all_events
            .get(origin)
            .expect("Propagated event must be tracked")
            .parents()
            .parents()
            .cloned()
            .collect();
        let mut updated = 0usize;
        while let Some(next) = queue.pop_front() {
            let ancestor = self
                .all_events
                .get_mut(&next)
                .expect("Ancestors of tracked events must be tracked");
            if ancestor.vectors.lower_first_descendant(creator, seq, origin) {
                updated += 1;
                queue.extend(ancestor.parents().parents().cloned());
            }
        }
        trace!("First descendants updated for {} ancestors", updated);
    }
}

/// Relations between events.
impl Graph {
    /// `true` iff `target` is `observer` or can be reached from it by
    /// following parent links.
    #[instrument(level = "trace", skip(self))]
    pub fn ancestor(
        &self,
        observer: &event::Hash,
        target: &event::Hash,
    ) -> Result<bool, UnknownEvent> {
        let x = self.get(observer)?;
        let y = self.get(target)?;
        if observer == target {
            return Ok(true);
        }
        if !self.is_forked(y.creator()) {
            // `y`'s lane is a chain, so every its event up to the highest one
            // reached by `x` is an ancestor of `x`
            let frontier = x.vectors.last_ancestor(self.creator_index(y.creator()));
            return Ok(frontier.map_or(false, |f| f.seq >= y.creator_seq()));
        }
        if !self.is_forked(x.creator()) {
            // `x`'s lane is a chain, so every its event starting from the
            // lowest descendant of `y` descends from `y`
            let frontier = y.vectors.first_descendant(self.creator_index(x.creator()));
            return Ok(frontier.map_or(false, |f| f.seq <= x.creator_seq()));
        }
        trace!("Both creators forked, walking the graph");
        Ok(self.walk_to(x, y))
    }

    /// Same as [`Self::ancestor`], but always walks the graph.
    pub fn ancestor_by_walk(
        &self,
        observer: &event::Hash,
        target: &event::Hash,
    ) -> Result<bool, UnknownEvent> {
        let x = self.get(observer)?;
        let y = self.get(target)?;
        Ok(self.walk_to(x, y))
    }

    /// `true` iff both events are by the same peer and `target` is reachable
    /// from `observer` by self parent links.
    #[instrument(level = "trace", skip(self))]
    pub fn self_ancestor(
        &self,
        observer: &event::Hash,
        target: &event::Hash,
    ) -> Result<bool, UnknownEvent> {
        let x = self.get(observer)?;
        let y = self.get(target)?;
        if x.creator() != y.creator() || x.creator_seq() < y.creator_seq() {
            return Ok(false);
        }
        if !self.is_forked(x.creator()) {
            return Ok(true);
        }
        // Sequence numbers alone say nothing on forked lanes
        let steps = usize::try_from(x.creator_seq() - y.creator_seq())
            .expect("Sequence difference must fit into memory");
        Ok(self
            .self_ancestor_iter(x)
            .nth(steps)
            .map_or(false, |e| e.hash() == target))
    }

    /// `true` iff `observer` has two ancestors by the creator of `target`
    /// such that neither is a self ancestor of the other.
    #[instrument(level = "trace", skip(self))]
    pub fn detect_fork(
        &self,
        observer: &event::Hash,
        target: &event::Hash,
    ) -> Result<bool, UnknownEvent> {
        self.get(observer)?;
        let y = self.get(target)?;
        let author_index = self.author_index(y.creator());
        // Any two incomparable events descend from two distinct siblings
        // of some branching point
        for siblings in author_index.fork_index().sibling_groups() {
            let mut seen = 0;
            for sibling in siblings {
                if self.ancestor(observer, sibling)? {
                    seen += 1;
                }
                if seen >= 2 {
                    debug!("Fork of {} is visible from {}", y.creator(), observer);
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Same as [`Self::detect_fork`], but collects all ancestors of the
    /// observer by the walk.
    pub fn detect_fork_by_walk(
        &self,
        observer: &event::Hash,
        target: &event::Hash,
    ) -> Result<bool, UnknownEvent> {
        self.get(observer)?;
        let author = *self.get(target)?.creator();
        // Ancestors include all self parents of each other, so a lane
        // visible from the observer is not a chain iff some sequence
        // number is repeated
        let mut seqs = HashSet::new();
        let repeated = AncestorIter::new(&self.all_events, observer, 0)
            .filter(|e| e.creator() == &author)
            .any(|e| !seqs.insert(e.creator_seq()));
        Ok(repeated)
    }

    /// Visible forks of `peer` from `observer`, each as the group of
    /// observed siblings (at least 2) of a single branching point.
    pub fn forked_branches(
        &self,
        observer: &event::Hash,
        peer: &PeerId,
    ) -> Result<Vec<Vec<event::Hash>>, UnknownEvent> {
        self.get(observer)?;
        let author_index = match self.peer_index.get(peer) {
            Some(i) => i,
            None => return Ok(vec![]),
        };
        let mut result = vec![];
        for siblings in author_index.fork_index().sibling_groups() {
            let mut observed = vec![];
            for sibling in siblings {
                if self.ancestor(observer, sibling)? {
                    observed.push(sibling.clone());
                }
            }
            if observed.len() >= 2 {
                observed.sort();
                result.push(observed);
            }
        }
        result.sort();
        Ok(result)
    }

    /// `target` is an ancestor of `observer` and no fork of its creator is
    /// visible from `observer`.
    #[instrument(level = "trace", skip(self))]
    pub fn see(&self, observer: &event::Hash, target: &event::Hash) -> Result<bool, UnknownEvent> {
        Ok(self.ancestor(observer, target)? && !self.detect_fork(observer, target)?)
    }
}

/// For navigating the graph state externally.
impl Graph {
    pub fn event(&self, id: &event::Hash) -> Option<&Event> {
        self.all_events.get(id).map(|e| e.inner())
    }

    pub fn contains(&self, id: &event::Hash) -> bool {
        self.all_events.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.all_events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_events.is_empty()
    }

    /// Number of peers that created at least one known event
    pub fn creator_count(&self) -> usize {
        self.creators.len()
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.creators.peers().iter()
    }

    pub fn peer_latest_event(&self, peer: &PeerId) -> Option<&event::Hash> {
        self.peer_index.get(peer).map(|e| e.latest_event())
    }

    pub fn peer_origins(&self, peer: &PeerId) -> Option<&[event::Hash]> {
        self.peer_index.get(peer).map(|e| e.origins().as_slice())
    }

    /// Whether any fork of `peer` is known to the graph at all
    pub fn is_forked(&self, peer: &PeerId) -> bool {
        self.peer_index
            .get(peer)
            .map_or(false, |index| index.is_forked())
    }

    /// Highest event of `peer` among ancestors of `event`
    pub fn last_ancestor(
        &self,
        event: &event::Hash,
        peer: &PeerId,
    ) -> Result<Option<&Frontier>, UnknownEvent> {
        let wrapper = self.get(event)?;
        Ok(self
            .creators
            .index_of(peer)
            .and_then(|i| wrapper.vectors.last_ancestor(i)))
    }

    /// Lowest event of `peer` among descendants of `event`
    pub fn first_descendant(
        &self,
        event: &event::Hash,
        peer: &PeerId,
    ) -> Result<Option<&Frontier>, UnknownEvent> {
        let wrapper = self.get(event)?;
        Ok(self
            .creators
            .index_of(peer)
            .and_then(|i| wrapper.vectors.first_descendant(i)))
    }

    /// Hashes of the events that have `event` as a parent
    pub fn children(&self, event: &event::Hash) -> Result<Vec<event::Hash>, UnknownEvent> {
        Ok(self.get(event)?.children.clone().into())
    }
}

impl Graph {
    fn get(&self, hash: &event::Hash) -> Result<&EventWrapper, UnknownEvent> {
        self.all_events
            .get(hash)
            .ok_or_else(|| UnknownEvent(hash.clone()))
    }

    fn author_index(&self, peer: &PeerId) -> &PeerIndexEntry {
        self.peer_index
            .get(peer)
            .expect("Authors of tracked events must be indexed")
    }

    fn creator_index(&self, peer: &PeerId) -> CreatorIndex {
        *self.author_index(peer).creator_index()
    }

    /// Walk from `from` down to events not older than `target`.
    fn walk_to(&self, from: &EventWrapper, target: &EventWrapper) -> bool {
        AncestorIter::new(&self.all_events, from.hash(), target.lamport_time())
            .any(|e| e.hash() == target.hash())
    }

    fn self_ancestor_iter<'a>(
        &'a self,
        event: &'a EventWrapper,
    ) -> impl Iterator<Item = &'a EventWrapper> {
        std::iter::successors(Some(event), move |e| {
            e.self_parent().map(|p| {
                self.all_events
                    .get(p)
                    .expect("Self parents of tracked events must be tracked")
            })
        })
    }
}

/// Iterator over ancestors of the event (including itself). Skips events
/// with lamport time lower than `min_lamport_time` together with their
/// ancestors (these are lower as well).
struct AncestorIter<'a> {
    event_list: Vec<&'a EventWrapper>,
    all_events: &'a EventIndex<EventWrapper>,
    visited_events: HashSet<&'a event::Hash>,
    min_lamport_time: LamportTime,
}

impl<'a> AncestorIter<'a> {
    fn new(
        all_events: &'a EventIndex<EventWrapper>,
        ancestors_of: &'a event::Hash,
        min_lamport_time: LamportTime,
    ) -> Self {
        let mut iter = AncestorIter {
            event_list: vec![],
            all_events,
            visited_events: HashSet::new(),
            min_lamport_time,
        };
        iter.push_self_ancestors(ancestors_of);
        iter
    }

    fn push_self_ancestors(&mut self, event_hash: &'a event::Hash) {
        let mut next = Some(event_hash);
        while let Some(hash) = next {
            let event = self
                .all_events
                .get(hash)
                .expect("Ancestors of tracked events must be tracked");
            if event.lamport_time() < self.min_lamport_time || !self.visited_events.insert(hash) {
                // Lower or already visited, as well as all of its self ancestors
                break;
            }
            self.event_list.push(event);
            next = event.self_parent();
        }
    }
}

impl<'a> Iterator for AncestorIter<'a> {
    type Item = &'a EventWrapper;

    fn next(&mut self) -> Option<Self::Item> {
        let event = self.event_list.pop()?;
        for other_parent in event.other_parents() {
            self.push_self_ancestors(other_parent);
        }
        Some(event)
    }
}

// Tests became larger than the code, so for easier navigation I've moved them
#[cfg(test)]
mod tests;
