//! Sharded byte interner behind [`Atom`].
//!
//! Provides O(1) interning and lookup with thread-safe concurrent access via
//! per-shard locking. Contents are byte strings rather than `str` because
//! string-literal payloads are raw bytes after escape decoding (`\xFF` is a
//! perfectly good literal byte).

use crate::Atom;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-shard storage for interned byte strings.
struct InternShard {
    /// Map from content to local index.
    map: FxHashMap<&'static [u8], u32>,
    /// Storage for contents, indexed by local index.
    entries: Vec<&'static [u8]>,
}

impl InternShard {
    fn new() -> Self {
        Self {
            map: FxHashMap::default(),
            entries: Vec::with_capacity(256),
        }
    }

    fn with_empty() -> Self {
        let mut shard = Self::new();
        let empty: &'static [u8] = b"";
        shard.map.insert(empty, 0);
        shard.entries.push(empty);
        shard
    }
}

/// Sharded byte interning pool.
///
/// Interned contents are leaked to obtain `'static` lifetime; the pool is
/// expected to live for the whole compilation.
///
/// # Thread Safety
/// Uses an `RwLock` per shard for concurrent read/write access, so the lexer
/// can intern through a shared `&CompileContext`.
pub struct Interner {
    shards: [RwLock<InternShard>; Atom::NUM_SHARDS],
    /// Total count of interned entries across all shards (O(1) `len()`).
    total_count: AtomicUsize,
}

impl Interner {
    /// Create a new pool with the empty string pre-interned as [`Atom::EMPTY`].
    pub fn new() -> Self {
        let shards = std::array::from_fn(|i| {
            if i == 0 {
                RwLock::new(InternShard::with_empty())
            } else {
                RwLock::new(InternShard::new())
            }
        });
        Self {
            shards,
            total_count: AtomicUsize::new(1),
        }
    }

    /// Compute the shard for a byte string based on a prefix hash.
    #[inline]
    fn shard_for(bytes: &[u8]) -> usize {
        let mut hash = 0u32;
        for &byte in bytes.iter().take(8) {
            hash = hash.wrapping_mul(31).wrapping_add(u32::from(byte));
        }
        (hash as usize) % Atom::NUM_SHARDS
    }

    /// Intern a byte string, returning its atom.
    ///
    /// Equal contents always return the same atom. Local indices are bounded
    /// by [`Atom::MAX_LOCAL`]; a shard would need over 250 million distinct
    /// entries to exceed it, far beyond any realistic source file.
    pub fn intern(&self, bytes: &[u8]) -> Atom {
        let shard_idx = Self::shard_for(bytes);
        let shard = &self.shards[shard_idx];
        let shard_tag = shard_idx as u32;

        // Fast path: already interned.
        {
            let guard = shard.read();
            if let Some(&local) = guard.map.get(bytes) {
                return Atom::new(shard_tag, local);
            }
        }

        let mut guard = shard.write();

        // Double-check after acquiring the write lock.
        if let Some(&local) = guard.map.get(bytes) {
            return Atom::new(shard_tag, local);
        }

        // Leak the contents to get a 'static reference.
        let leaked: &'static [u8] = Box::leak(bytes.to_vec().into_boxed_slice());

        let local = guard.entries.len() as u32 & Atom::MAX_LOCAL;
        guard.entries.push(leaked);
        guard.map.insert(leaked, local);

        self.total_count.fetch_add(1, Ordering::Relaxed);

        Atom::new(shard_tag, local)
    }

    /// Look up the contents of an atom.
    ///
    /// The `'static` lifetime is sound because interned contents are leaked
    /// and never deallocated.
    pub fn lookup(&self, atom: Atom) -> &'static [u8] {
        let guard = self.shards[atom.shard()].read();
        guard.entries[atom.local()]
    }

    /// Number of interned entries (O(1)).
    pub fn len(&self) -> usize {
        self.total_count.load(Ordering::Relaxed)
    }

    /// Check if the pool holds only the pre-interned empty string.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_and_lookup() {
        let pool = Interner::new();

        let hello = pool.intern(b"hello");
        let world = pool.intern(b"world");
        let hello2 = pool.intern(b"hello");

        assert_eq!(hello, hello2);
        assert_ne!(hello, world);

        assert_eq!(pool.lookup(hello), b"hello");
        assert_eq!(pool.lookup(world), b"world");
    }

    #[test]
    fn empty_string_pre_interned() {
        let pool = Interner::new();
        assert_eq!(pool.intern(b""), Atom::EMPTY);
        assert_eq!(pool.lookup(Atom::EMPTY), b"");
        assert!(pool.is_empty());
    }

    #[test]
    fn non_utf8_contents() {
        let pool = Interner::new();
        let atom = pool.intern(&[0xFF, 0x00, 0x41]);
        assert_eq!(pool.lookup(atom), &[0xFF, 0x00, 0x41]);
    }

    #[test]
    fn len_counts_distinct_entries() {
        let pool = Interner::new();
        pool.intern(b"a");
        pool.intern(b"b");
        pool.intern(b"a");
        // empty string + "a" + "b"
        assert_eq!(pool.len(), 3);
    }
}
