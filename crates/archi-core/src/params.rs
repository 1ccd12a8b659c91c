//! The parameter list value protocol (component C): the universal
//! keyword-argument carrier passed to every context operation.

use crate::pointer::Pointer;

/// An ordered `(name, Pointer)` multimap, preserving insertion order and
/// honouring "first wins" on duplicate names, exactly as the singly
/// linked list the original walks once would.
#[derive(Debug, Clone, Default)]
pub struct ParameterList {
    entries: Vec<(String, Pointer)>,
}

impl ParameterList {
    /// An empty parameter list.
    #[must_use]
    pub fn new() -> ParameterList {
        ParameterList { entries: Vec::new() }
    }

    /// Build a parameter list from an ordered sequence of `(name, value)`
    /// pairs, in the order supplied.
    #[must_use]
    pub fn from_entries<I>(entries: I) -> ParameterList
    where
        I: IntoIterator<Item = (String, Pointer)>,
    {
        ParameterList {
            entries: entries.into_iter().collect(),
        }
    }

    /// Number of entries (including shadowed duplicates).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a name, returning the *first* matching entry (first wins
    /// on duplicates, per the specification).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Pointer> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Iterate entries in insertion order, duplicates included — the
    /// consumer decides name semantics, per the specification.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Pointer)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Append an entry.
    pub fn push(&mut self, name: impl Into<String>, value: Pointer) {
        self.entries.push((name.into(), value));
    }

    /// Merge `overrides` on top of `self`, with `overrides` taking
    /// precedence by name — the CLI-overrides-file precedence rule for
    /// an input file's `params` list (§6). Implemented as "override
    /// entries first, then base entries whose name wasn't overridden",
    /// which composes with the "first wins" traversal rule to produce
    /// override-wins semantics without needing a separate lookup pass.
    #[must_use]
    pub fn override_with(&self, overrides: &ParameterList) -> ParameterList {
        let mut merged = overrides.clone();
        for (name, value) in &self.entries {
            if overrides.get(name).is_none() {
                merged.push(name.clone(), value.clone());
            }
        }
        merged
    }

    /// Resolve a structured field, honoring the `"params"` base-struct
    /// override convention: an entry named `"params"` supplies the whole
    /// base value (if `decode_base` can build `T` from it), and a sibling
    /// entry named `field_name` overrides just that field on top of it.
    ///
    /// Returns `None` if neither `"params"` nor `field_name` is present
    /// and no `default` is supplied.
    pub fn resolve_field<T>(
        &self,
        field_name: &str,
        decode_base: impl FnOnce(&Pointer) -> Option<T>,
        default: impl FnOnce() -> Option<T>,
    ) -> Option<T>
    where
        T: Clone,
    {
        if let Some(field) = self.get(field_name) {
            if let Some(value) = decode_base(field) {
                return Some(value);
            }
        }
        if let Some(params) = self.get("params") {
            if let Some(value) = decode_base(params) {
                return Some(value);
            }
        }
        default()
    }
}

impl FromIterator<(String, Pointer)> for ParameterList {
    fn from_iter<T: IntoIterator<Item = (String, Pointer)>>(iter: T) -> Self {
        ParameterList::from_entries(iter)
    }
}
