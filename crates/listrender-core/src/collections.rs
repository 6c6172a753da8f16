#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::{HashMap, HashSet};
}

use crate::hash::BuildIdentityHasher;

/// Map keyed by identity keys, slot indices or work indices.
pub type IdentityMap<K, V> = map::HashMap<K, V, BuildIdentityHasher>;

/// Set counterpart of [`IdentityMap`].
pub type IdentitySet<K> = map::HashSet<K, BuildIdentityHasher>;
