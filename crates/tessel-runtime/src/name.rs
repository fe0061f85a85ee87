//! Interned method and attribute names
//!
//! The loader hands out interned names for constant strings. An interned name
//! keeps the same identity for the lifetime of its [`NameTable`], which is what
//! the method cache keys on. Names built at run time (e.g. `obj.$name()`) are
//! transient and never touch the cache.

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::Arc;

/// A method or attribute name
#[derive(Clone)]
pub struct Name {
    text: Arc<str>,
    interned: bool,
}

impl Name {
    /// Create a non-interned name
    pub fn transient(text: &str) -> Self {
        Self {
            text: Arc::from(text),
            interned: false,
        }
    }

    /// Name text
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Shared text (cheap clone)
    pub fn text(&self) -> &Arc<str> {
        &self.text
    }

    /// Whether this name came from a [`NameTable`]
    #[inline]
    pub fn is_interned(&self) -> bool {
        self.interned
    }

    /// Identity of the name, stable only for interned names
    #[inline]
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.text) as *const u8 as usize
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Name {}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.interned {
            write!(f, "Name({:?})", &*self.text)
        } else {
            write!(f, "Name({:?}, transient)", &*self.text)
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Interner for constant names
#[derive(Debug, Default)]
pub struct NameTable {
    strings: Mutex<FxHashSet<Arc<str>>>,
}

impl NameTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name, returning the canonical instance
    pub fn intern(&self, text: &str) -> Name {
        let mut strings = self.strings.lock();
        let text = match strings.get(text) {
            Some(existing) => existing.clone(),
            None => {
                let fresh: Arc<str> = Arc::from(text);
                strings.insert(fresh.clone());
                fresh
            }
        };
        Name {
            text,
            interned: true,
        }
    }

    /// Number of interned names
    pub fn len(&self) -> usize {
        self.strings.lock().len()
    }

    /// Check if nothing has been interned
    pub fn is_empty(&self) -> bool {
        self.strings.lock().is_empty()
    }
}
