//! Append-only, deduplicating string storage.
//!
//! Provides O(1) lookup by index and O(1) amortized interning. The pool is
//! single-owner: it lives inside a [`Program`](crate::Program) and is only
//! mutated while parsing. Execution states hold `PoolStr` indices into it,
//! never pointers, so the backing `Vec` is free to reallocate on append.

use rustc_hash::FxHashMap;

/// Index of an interned string inside a [`StringPool`].
///
/// Stable for the lifetime of the pool; never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolStr(u32);

impl PoolStr {
    /// The pre-pooled empty string.
    pub const EMPTY: PoolStr = PoolStr(0);

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Error when interning a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOverflow {
    /// Number of strings already pooled when the append was refused.
    pub count: usize,
}

impl std::fmt::Display for PoolOverflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "string pool capacity exceeded: {} strings", self.count)
    }
}

impl std::error::Error for PoolOverflow {}

/// Append-only string pool with deduplication.
///
/// Interning the same text twice returns the same `PoolStr`, so symbol
/// equality is index equality for strings from the same pool.
#[derive(Debug, Default)]
pub struct StringPool {
    /// Storage for string contents, addressed by `PoolStr`.
    strings: Vec<String>,
    /// Map from string content to index.
    map: FxHashMap<String, u32>,
    /// Maximum number of pooled strings; `None` means unbounded.
    capacity: Option<usize>,
}

impl StringPool {
    /// Create a pool with the empty string pre-pooled at index 0.
    pub fn new() -> Self {
        let mut pool = StringPool {
            strings: Vec::with_capacity(64),
            map: FxHashMap::default(),
            capacity: None,
        };
        pool.map.insert(String::new(), 0);
        pool.strings.push(String::new());
        pool
    }

    /// Create a pool that refuses to grow past `capacity` strings.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        let mut pool = Self::new();
        pool.capacity = Some(capacity);
        pool
    }

    /// Intern a string, returning its index.
    ///
    /// Returns `PoolOverflow` if the pool is at its capacity limit and the
    /// string is not already present.
    pub fn intern(&mut self, s: &str) -> Result<PoolStr, PoolOverflow> {
        if let Some(&idx) = self.map.get(s) {
            return Ok(PoolStr(idx));
        }
        if let Some(cap) = self.capacity {
            if self.strings.len() >= cap {
                return Err(PoolOverflow {
                    count: self.strings.len(),
                });
            }
        }
        // u32 is plenty: a pool this large would need gigabytes of source.
        let idx = u32::try_from(self.strings.len()).map_err(|_| PoolOverflow {
            count: self.strings.len(),
        })?;
        self.strings.push(s.to_owned());
        self.map.insert(s.to_owned(), idx);
        Ok(PoolStr(idx))
    }

    /// Look up the text for an index.
    #[inline]
    pub fn resolve(&self, s: PoolStr) -> &str {
        &self.strings[s.index()]
    }

    /// Number of pooled strings (including the pre-pooled empty string).
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// True if only the empty string is pooled.
    pub fn is_empty(&self) -> bool {
        self.strings.len() <= 1
    }
}
