use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Abstract face identifier handed to the engine caches.
///
/// Ids are allocated from a counter that never resets, so an id is never
/// reused within a process run, even after its font has been closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(u64);

impl FaceId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Physical address of a face: font slot in the catalog, face inside the file
/// and named instance inside the face (`0` is the default instance).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceTriplet {
    pub font_index: usize,
    pub face_index: u32,
    pub named_instance_index: u32,
}

impl FaceTriplet {
    pub fn new(font_index: usize, face_index: u32, named_instance_index: u32) -> Self {
        Self {
            font_index,
            face_index,
            named_instance_index,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct RegistryEntry {
    triplet: FaceTriplet,
    retired: bool,
}

/// Bijective mapping between face triplets and [`FaceId`]s.
pub struct FaceRegistry {
    ids: HashMap<FaceTriplet, FaceId, fxhash::FxBuildHasher>,
    entries: HashMap<FaceId, RegistryEntry, fxhash::FxBuildHasher>,
    next_id: u64,
}

impl Default for FaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceRegistry {
    pub fn new() -> Self {
        Self {
            ids: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
            entries: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
            next_id: 1,
        }
    }

    /// Returns the id of `triplet`, allocating a fresh one on first use.
    ///
    /// Fails with [`Error::FaceIdsExhausted`] instead of wrapping around once
    /// the counter runs out.
    pub fn resolve(&mut self, triplet: FaceTriplet) -> Result<FaceId> {
        if let Some(&id) = self.ids.get(&triplet) {
            return Ok(id);
        }

        let Some(next_id) = self.next_id.checked_add(1) else {
            log::error!("face id counter exhausted, refusing to allocate for {:?}", triplet);
            return Err(Error::FaceIdsExhausted);
        };
        let id = FaceId(self.next_id);
        self.next_id = next_id;

        self.ids.insert(triplet, id);
        self.entries.insert(
            id,
            RegistryEntry {
                triplet,
                retired: false,
            },
        );
        log::trace!("allocated face id {} for {:?}", id, triplet);

        Ok(id)
    }

    /// Reverse lookup used by the engine's face requester.
    pub fn lookup(&self, id: FaceId) -> Result<FaceTriplet> {
        match self.entries.get(&id) {
            Some(entry) if entry.retired => Err(Error::StaleFaceId(id)),
            Some(entry) => Ok(entry.triplet),
            None => Err(Error::NotFound(id)),
        }
    }

    /// Retires every live id whose font index is `>= font_index`.
    ///
    /// Closing a font shifts all following fonts down by one, so ids issued for
    /// the closed font and for every shifted font would otherwise alias a
    /// different file. Retired ids fail with [`Error::StaleFaceId`].
    pub fn retire_font(&mut self, font_index: usize) -> Vec<FaceId> {
        let mut retired = Vec::new();

        self.ids.retain(|triplet, id| {
            if triplet.font_index >= font_index {
                retired.push(*id);
                false
            } else {
                true
            }
        });

        for id in &retired {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.retired = true;
            }
        }

        retired.sort_unstable();
        retired
    }

    /// Number of live (non-retired) ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
