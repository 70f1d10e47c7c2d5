//! The compile context: what one compilation run shares across phases.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::{Atom, DiagKind, Diagnostic, Interner, NoteKind, Reports, TokenPos};

/// Shared services for a single compilation: the interning pool, the
/// diagnostic sink, and the mutable `#pragma dynamic` setting.
///
/// Handed around as `&CompileContext`; all contained state is internally
/// synchronized.
pub struct CompileContext {
    strings: Interner,
    reports: Reports,
    /// Requested dynamic stack size, set by `#pragma dynamic`.
    pragma_dynamic: AtomicI64,
}

impl CompileContext {
    pub fn new() -> Self {
        CompileContext {
            strings: Interner::new(),
            reports: Reports::new(),
            pragma_dynamic: AtomicI64::new(0),
        }
    }

    /// Intern a byte string.
    #[inline]
    pub fn intern(&self, bytes: &[u8]) -> Atom {
        self.strings.intern(bytes)
    }

    /// Look up an atom's contents.
    #[inline]
    pub fn lookup(&self, atom: Atom) -> &'static [u8] {
        self.strings.lookup(atom)
    }

    /// The interning pool.
    pub fn strings(&self) -> &Interner {
        &self.strings
    }

    /// The diagnostic sink.
    pub fn reports(&self) -> &Reports {
        &self.reports
    }

    /// Report a diagnostic at a location.
    pub fn report(&self, loc: TokenPos, kind: DiagKind) {
        self.reports.push(Diagnostic::new(loc, kind));
    }

    /// Report a diagnostic with a secondary note.
    pub fn report_with_note(
        &self,
        loc: TokenPos,
        kind: DiagKind,
        note_loc: TokenPos,
        note: NoteKind,
    ) {
        self.reports
            .push(Diagnostic::new(loc, kind).with_note(note_loc, note));
    }

    /// Apply a `#pragma dynamic` value. Negative sizes are rejected.
    pub fn change_pragma_dynamic(&self, value: i64) -> bool {
        if value < 0 {
            return false;
        }
        self.pragma_dynamic.store(value, Ordering::Relaxed);
        true
    }

    /// The current `#pragma dynamic` value.
    pub fn pragma_dynamic(&self) -> i64 {
        self.pragma_dynamic.load(Ordering::Relaxed)
    }
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_goes_through_the_context() {
        let cc = CompileContext::new();
        let a = cc.intern(b"foo");
        let b = cc.intern(b"foo");
        assert_eq!(a, b);
        assert_eq!(cc.lookup(a), b"foo");
    }

    #[test]
    fn pragma_dynamic_rejects_negative() {
        let cc = CompileContext::new();
        assert!(cc.change_pragma_dynamic(4096));
        assert_eq!(cc.pragma_dynamic(), 4096);
        assert!(!cc.change_pragma_dynamic(-1));
        assert_eq!(cc.pragma_dynamic(), 4096);
    }
}
