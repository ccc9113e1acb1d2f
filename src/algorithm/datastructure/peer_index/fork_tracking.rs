use std::collections::{hash_map::Entry, HashMap, HashSet};

use derive_getters::Getters;

use crate::algorithm::event::{self, EventWrapper};

/// Places where a single peer's lane branches.
///
/// Since each event has at most one self parent, events of a peer form a
/// forest. It is a single chain for honest peers; every point where it is not
/// is recorded here.
#[derive(Getters, Default, Debug)]
pub struct ForkIndex {
    /// Self parent -> all of its self children (at least 2)
    forks: HashMap<event::Hash, HashSet<event::Hash>>,
    /// Events without self parent, tracked only once there are at least 2
    forked_origins: HashSet<event::Hash>,
}

impl ForkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.forks.is_empty() && self.forked_origins.is_empty()
    }

    pub fn track_fork(&mut self, fork_parent: &EventWrapper, new_fork_child: event::Hash) {
        match self.forks.entry(fork_parent.hash().clone()) {
            Entry::Occupied(mut fork) => {
                let fork = fork.get_mut();
                fork.insert(new_fork_child);
            }
            Entry::Vacant(place) => {
                let mut fork_children = fork_parent.children.self_child.clone();
                fork_children.add_child(new_fork_child);
                let fork_children: Vec<_> = fork_children.into();
                place.insert(HashSet::from_iter(fork_children));
            }
        }
    }

    /// `origins` are all origin events of the peer, including the new one
    pub fn track_origin_fork(&mut self, origins: &[event::Hash]) {
        self.forked_origins.extend(origins.iter().cloned());
    }

    /// Groups of events sharing the same self parent (or sharing absence of
    /// it). No two events within a group are self ancestors of each other.
    pub fn sibling_groups(&self) -> impl Iterator<Item = &HashSet<event::Hash>> {
        self.forks
            .values()
            .chain(Some(&self.forked_origins).filter(|o| !o.is_empty()))
    }
}
