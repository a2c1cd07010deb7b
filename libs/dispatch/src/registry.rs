//! Global Identity Registry
//!
//! Maps a [`Gid`] to the locality currently hosting the instance and its
//! locality-private handle. Sharded (`dashmap`), so lookups from many workers
//! only contend when they hit the same shard, and an update locks one shard.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use types::{Gid, LocalHandle, LocalityId, Result, RuntimeError};

/// Where a GID currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub locality: LocalityId,
    pub handle: LocalHandle,
}

impl Location {
    pub fn new(locality: LocalityId, handle: LocalHandle) -> Self {
        Self { locality, handle }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.locality, self.handle)
    }
}

/// Registry of GID locations as known by one locality
#[derive(Debug)]
pub struct GidRegistry {
    locality: LocalityId,
    /// Sequence 0 is never handed out; sequences are never reused
    next_sequence: AtomicU64,
    entries: DashMap<Gid, Location>,
}

impl GidRegistry {
    pub fn new(locality: LocalityId) -> Self {
        Self {
            locality,
            next_sequence: AtomicU64::new(1),
            entries: DashMap::new(),
        }
    }

    /// Locality this registry allocates for
    pub fn locality(&self) -> LocalityId {
        self.locality
    }

    /// Fresh GID carrying this locality's prefix
    pub fn allocate(&self) -> Gid {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        Gid::new(self.locality, sequence)
    }

    /// Record where `gid` lives. Fails with `DuplicateIdentity` if already present.
    pub fn register(&self, gid: Gid, locality: LocalityId, handle: LocalHandle) -> Result<()> {
        if !gid.is_valid() {
            return Err(RuntimeError::UnknownIdentity { gid });
        }

        match self.entries.entry(gid) {
            Entry::Occupied(_) => Err(RuntimeError::DuplicateIdentity { gid }),
            Entry::Vacant(slot) => {
                slot.insert(Location::new(locality, handle));
                debug!(gid = %gid, locality = %locality, handle = %handle, "registered identity");
                Ok(())
            }
        }
    }

    pub fn resolve(&self, gid: Gid) -> Result<Location> {
        self.entries
            .get(&gid)
            .map(|entry| *entry.value())
            .ok_or(RuntimeError::UnknownIdentity { gid })
    }

    /// Move `gid` to another locality, keeping its handle
    pub fn update_location(&self, gid: Gid, locality: LocalityId) -> Result<Location> {
        let mut entry = self
            .entries
            .get_mut(&gid)
            .ok_or(RuntimeError::UnknownIdentity { gid })?;
        let previous = *entry;
        entry.locality = locality;
        debug!(gid = %gid, from = %previous.locality, to = %locality, "identity relocated");
        Ok(previous)
    }

    /// Replace the whole location (migration onto a new handle)
    pub fn update_entry(&self, gid: Gid, location: Location) -> Result<Location> {
        let mut entry = self
            .entries
            .get_mut(&gid)
            .ok_or(RuntimeError::UnknownIdentity { gid })?;
        Ok(std::mem::replace(&mut *entry, location))
    }

    /// Drop the entry. Liveness is the caller's business.
    pub fn release(&self, gid: Gid) -> Result<Location> {
        let (_, location) = self
            .entries
            .remove(&gid)
            .ok_or(RuntimeError::UnknownIdentity { gid })?;
        debug!(gid = %gid, "released identity");
        Ok(location)
    }

    pub fn contains(&self, gid: Gid) -> bool {
        self.entries.contains_key(&gid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// GIDs hosted by this locality, with their handles
    pub fn local_entries(&self) -> Vec<(Gid, LocalHandle)> {
        self.entries
            .iter()
            .filter(|entry| entry.value().locality == self.locality)
            .map(|entry| (*entry.key(), entry.value().handle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    const HERE: LocalityId = LocalityId::new(0);
    const THERE: LocalityId = LocalityId::new(1);

    #[test]
    fn test_allocate_is_unique_and_prefixed() {
        let registry = Arc::new(GidRegistry::new(LocalityId::new(4)));
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || (0..1000).map(|_| registry.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for t in threads {
            for gid in t.join().unwrap() {
                assert!(gid.is_valid());
                assert_eq!(gid.home_locality(), LocalityId::new(4));
                assert!(seen.insert(gid));
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    #[test]
    fn test_register_resolve_release() {
        let registry = GidRegistry::new(HERE);
        let gid = registry.allocate();

        assert_eq!(
            registry.resolve(gid),
            Err(RuntimeError::UnknownIdentity { gid })
        );

        registry.register(gid, HERE, LocalHandle::new(7)).unwrap();
        assert_eq!(
            registry.resolve(gid).unwrap(),
            Location::new(HERE, LocalHandle::new(7))
        );
        assert_eq!(
            registry.register(gid, THERE, LocalHandle::new(1)),
            Err(RuntimeError::DuplicateIdentity { gid })
        );

        registry.release(gid).unwrap();
        assert!(!registry.contains(gid));
        assert!(registry.release(gid).is_err());
    }

    #[test]
    fn test_invalid_gid_rejected() {
        let registry = GidRegistry::new(HERE);
        assert!(registry
            .register(Gid::INVALID, HERE, LocalHandle::new(1))
            .is_err());
    }

    #[test]
    fn test_update_location_keeps_gid_value() {
        let registry = GidRegistry::new(HERE);
        let gid = registry.allocate();
        registry.register(gid, HERE, LocalHandle::new(3)).unwrap();

        let previous = registry.update_location(gid, THERE).unwrap();
        assert_eq!(previous.locality, HERE);
        assert_eq!(registry.resolve(gid).unwrap().locality, THERE);
        assert_eq!(gid.home_locality(), HERE);
        assert!(registry.local_entries().is_empty());

        registry
            .update_entry(gid, Location::new(HERE, LocalHandle::new(9)))
            .unwrap();
        assert_eq!(registry.local_entries(), vec![(gid, LocalHandle::new(9))]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Move(usize, u32),
        Release(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..8usize, 0..4u32).prop_map(|(i, l)| Op::Move(i, l)),
            (0..8usize).prop_map(Op::Release),
        ]
    }

    proptest! {
        #[test]
        fn prop_resolve_reflects_latest_update(ops in proptest::collection::vec(op(), 0..64)) {
            let registry = GidRegistry::new(HERE);
            let gids: Vec<_> = (0..8).map(|_| registry.allocate()).collect();
            let mut model: Vec<Option<LocalityId>> = vec![Some(HERE); 8];
            for (i, gid) in gids.iter().enumerate() {
                registry.register(*gid, HERE, LocalHandle::new(i as u64)).unwrap();
            }

            for op in ops {
                match op {
                    Op::Move(i, l) => {
                        let result = registry.update_location(gids[i], LocalityId::new(l));
                        prop_assert_eq!(result.is_ok(), model[i].is_some());
                        if model[i].is_some() {
                            model[i] = Some(LocalityId::new(l));
                        }
                    }
                    Op::Release(i) => {
                        prop_assert_eq!(registry.release(gids[i]).is_ok(), model[i].is_some());
                        model[i] = None;
                    }
                }
            }

            for (i, gid) in gids.iter().enumerate() {
                match model[i] {
                    Some(locality) => {
                        let location = registry.resolve(*gid).unwrap();
                        prop_assert_eq!(location.locality, locality);
                        prop_assert_eq!(location.handle, LocalHandle::new(i as u64));
                    }
                    None => prop_assert!(registry.resolve(*gid).is_err()),
                }
            }
        }
    }
}
