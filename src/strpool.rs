use rustc_hash::FxHashMap;

//===----------------------------------------------------------------------===//
// StrRef
//===----------------------------------------------------------------------===//

/// A stable reference into a [`StrPool`]: byte offset plus length.
///
/// The pool is append-only, so a `StrRef` stays valid for the lifetime of the
/// pool that produced it. Because interning deduplicates, two references to
/// the same byte string compare equal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StrRef {
    off: u32,
    len: u32,
}

impl StrRef {
    pub fn offset(&self) -> usize {
        self.off as usize
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

//===----------------------------------------------------------------------===//
// StrPool
//===----------------------------------------------------------------------===//

/// Deduplicating append-only string pool.
///
/// Every symbol and string literal the parser sees is interned here exactly
/// once; the AST, environment entries and stack values all refer to text by
/// `StrRef` instead of owning strings.
#[derive(Debug, Default)]
pub struct StrPool {
    buf: String,
    index: FxHashMap<String, StrRef>,
}

impl StrPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `s` to the pool and returns a stable reference to it. If the
    /// same byte string was interned before, the original reference is
    /// returned instead of appending again.
    pub fn intern(&mut self, s: &str) -> StrRef {
        if let Some(&r) = self.index.get(s) {
            return r;
        }
        let r = StrRef { off: self.buf.len() as u32, len: s.len() as u32 };
        self.buf.push_str(s);
        self.index.insert(s.to_owned(), r);
        r
    }

    /// Finds the reference for text that was already interned, without
    /// mutating the pool.
    pub fn lookup(&self, s: &str) -> Option<StrRef> {
        self.index.get(s).copied()
    }

    /// Borrows the interned text.
    pub fn get(&self, r: StrRef) -> &str {
        &self.buf[r.offset()..r.offset() + r.len()]
    }

    /// Returns a freshly allocated copy, decoupled from the pool's layout.
    pub fn extract(&self, r: StrRef) -> String {
        self.get(r).to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_same_string_returns_same_ref() {
        let mut pool = StrPool::new();
        let a = pool.intern("lambda");
        let b = pool.intern("lambda");
        assert_eq!(a, b);
        assert_eq!(pool.get(a), "lambda");
    }

    #[test]
    fn intern_different_strings_returns_different_refs() {
        let mut pool = StrPool::new();
        let a = pool.intern("foo");
        let b = pool.intern("bar");
        assert_ne!(a, b);
        assert_eq!(pool.get(a), "foo");
        assert_eq!(pool.get(b), "bar");
    }

    #[test]
    fn refs_stay_valid_across_growth() {
        let mut pool = StrPool::new();
        let first = pool.intern("first");
        for i in 0..1000 {
            pool.intern(&format!("sym-{}", i));
        }
        assert_eq!(pool.get(first), "first");
    }

    #[test]
    fn extract_is_an_owned_copy() {
        let mut pool = StrPool::new();
        let r = pool.intern("copy-me");
        let owned = pool.extract(r);
        pool.intern("more");
        assert_eq!(owned, "copy-me");
    }

    #[test]
    fn empty_string_interns() {
        let mut pool = StrPool::new();
        let r = pool.intern("");
        assert!(r.is_empty());
        assert_eq!(pool.get(r), "");
    }
}
