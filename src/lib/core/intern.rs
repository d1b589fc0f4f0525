//! Owned string interning.
//!
//! Feature names and sample names repeat heavily across input files, so they
//! are stored once and referred to by a dense [`NameId`].

use rustc_hash::FxHashMap;

/// Handle to a string held by a [`NameInterner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameId(u32);

impl NameId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// String to dense index map, preserving first-seen order.
#[derive(Debug, Clone, Default)]
pub struct NameInterner {
    ordered: Vec<String>,
    index: FxHashMap<String, NameId>,
}

impl NameInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle for `name`, inserting it when not yet present.
    pub fn intern(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = NameId(self.ordered.len() as u32);
        self.ordered.push(name.to_string());
        self.index.insert(name.to_string(), id);
        id
    }

    /// Resolve a handle back to its string.
    #[inline]
    pub fn resolve(&self, id: NameId) -> &str {
        &self.ordered[id.index()]
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Borrow the interned strings in first-seen order.
    pub fn names(&self) -> &[String] {
        &self.ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_names_share_a_handle() {
        let mut interner = NameInterner::new();
        let alu = interner.intern("AluY");
        let l1 = interner.intern("L1HS");
        assert_eq!(interner.intern("AluY"), alu);
        assert_ne!(alu, l1);
        assert_eq!(interner.resolve(l1), "L1HS");
        assert_eq!(interner.names(), &["AluY".to_string(), "L1HS".to_string()]);
        assert_eq!(interner.len(), 2);
    }
}
