//! Open container scopes.
//!
//! Lists nest: a list pushed later never ends after the one below it.
//! Scopes are not closed explicitly; they are dropped as soon as the read
//! position reaches their end offset.

use log::{trace, warn};

use super::chunk::Structure;
use crate::utils::errors::ScopeError;

#[derive(Debug, Default, Clone)]
pub struct ScopeStack {
    stack: Vec<Structure>,
}

impl ScopeStack {
    /// Pops closed scopes, then pushes `scope`.
    ///
    /// A scope reaching beyond its parent is clamped to the parent's end.
    pub fn push(&mut self, mut scope: Structure, position: u64) {
        self.cleanup(position);

        if let Some(parent) = self.stack.last() {
            if scope.end_offset > parent.end_offset {
                warn!(
                    "{}",
                    ScopeError::ChildOutlivesParent {
                        child: scope.fourcc,
                        child_end: scope.end_offset,
                        parent: parent.fourcc,
                        parent_end: parent.end_offset,
                    }
                );
                scope.end_offset = parent.end_offset;
            }
        }

        trace!(
            "{:indent$}{scope}",
            "",
            indent = self.stack.len() * 2
        );
        self.stack.push(scope);
    }

    /// Drops every scope whose end offset is at or before `position`.
    pub fn cleanup(&mut self, position: u64) {
        while let Some(top) = self.stack.last() {
            if top.end_offset > position {
                break;
            }
            trace!("closing {} at {position}", top.fourcc);
            self.stack.pop();
        }
    }

    pub fn top(&self) -> Option<&Structure> {
        self.stack.last()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Structure> {
        self.stack.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::chunk::ParseKind;
    use crate::structs::fourcc::FourCC;

    fn list(list_type: &[u8; 4], size: u32, start: u64) -> Structure {
        let mut header = b"LIST".to_vec();
        header.extend_from_slice(&size.to_le_bytes());
        header.extend_from_slice(list_type);
        Structure::recognize(&header, start, ParseKind::List).unwrap()
    }

    #[test]
    fn nested_scopes_pop_by_offset() {
        let mut scopes = ScopeStack::default();

        scopes.push(list(b"hdrl", 100, 12), 12);
        scopes.push(list(b"strl", 40, 24), 24);
        assert_eq!(scopes.depth(), 2);

        // strl ends at 24 + 8 + 40 = 72
        scopes.cleanup(71);
        assert_eq!(scopes.depth(), 2);
        scopes.cleanup(72);
        assert_eq!(scopes.depth(), 1);
        assert_eq!(scopes.top().map(|s| s.fourcc), Some(FourCC::HDRL));

        // second strl replaces nothing, pushes on hdrl
        scopes.push(list(b"strl", 20, 72), 72);
        assert_eq!(scopes.depth(), 2);

        // hdrl ends at 12 + 8 + 100 = 120; pushing movi there closes both
        scopes.push(list(b"movi", 500, 120), 120);
        assert_eq!(scopes.depth(), 1);
        assert_eq!(scopes.top().map(|s| s.fourcc), Some(FourCC::MOVI));
    }

    #[test]
    fn child_is_clamped_to_parent() {
        let mut scopes = ScopeStack::default();

        scopes.push(list(b"movi", 30, 0), 0);
        scopes.push(list(b"rec ", 100, 12), 12);

        let ends: Vec<u64> = scopes.iter().map(|s| s.end_offset).collect();
        assert_eq!(ends, vec![38, 38]);

        scopes.cleanup(38);
        assert!(scopes.is_empty());
    }
}
