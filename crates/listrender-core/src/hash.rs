use core::hash::BuildHasherDefault;

#[cfg(feature = "std-hash")]
pub mod default {
    pub use std::collections::hash_map::DefaultHasher;
}

#[cfg(not(feature = "std-hash"))]
pub mod default {
    pub use ahash::AHasher as DefaultHasher;
}

/// Hasher builder used by every identity map in the crate.
pub type BuildIdentityHasher = BuildHasherDefault<default::DefaultHasher>;
