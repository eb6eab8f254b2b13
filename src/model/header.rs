//! Ordered header collections.

use std::collections::HashMap;

/// Header names that may legitimately appear more than once.
pub const REPEATABLE_HEADERS: &[&str] = &["received"];

/// Whether `name` is a usable RFC 5322 field name: printable ASCII, no colon.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic() && b != b':')
}

/// Whether `name` (any case) may appear several times.
pub fn is_repeatable(name: &str) -> bool {
    REPEATABLE_HEADERS
        .iter()
        .any(|r| r.eq_ignore_ascii_case(name))
}

/// A single header line: case-preserved name plus unfolded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    name: String,
    pub value: String,
}

impl HeaderEntry {
    /// Build an entry. Returns `None` if the trimmed name is empty.
    pub fn new(name: &str, value: impl Into<String>) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            value: value.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercase name used for lookups.
    pub fn key(&self) -> String {
        self.name.to_ascii_lowercase()
    }
}

/// Ordered headers with O(1) "is this name present" lookup.
///
/// The set itself does not enforce uniqueness; [`HeaderSet::insert_if_absent`]
/// and [`HeaderSet::set`] are the operations that keep non-repeatable names
/// single. Neither moves an existing header.
#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    entries: Vec<HeaderEntry>,
    counts: HashMap<String, usize>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append without any check.
    pub fn push(&mut self, entry: HeaderEntry) {
        *self.counts.entry(entry.key()).or_insert(0) += 1;
        self.entries.push(entry);
    }

    /// Whether a header with this name (any case) is present.
    pub fn contains(&self, name: &str) -> bool {
        self.counts
            .get(&name.to_ascii_lowercase())
            .is_some_and(|&n| n > 0)
    }

    /// Append only if no header of that name is present. Returns whether it was added.
    pub fn insert_if_absent(&mut self, name: &str, value: impl Into<String>) -> bool {
        if self.contains(name) {
            return false;
        }
        match HeaderEntry::new(name, value) {
            Some(entry) => {
                self.push(entry);
                true
            }
            None => false,
        }
    }

    /// Give a header this value.
    ///
    /// The first header of that name keeps its position and takes the new
    /// value; later ones are dropped. Absent names are appended.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let Some(entry) = HeaderEntry::new(name, value) else {
            return;
        };
        let key = entry.key();
        let Some(pos) = self.entries.iter().position(|e| e.key() == key) else {
            self.push(entry);
            return;
        };
        self.entries[pos].value = entry.value;
        let mut seen = false;
        self.entries.retain(|e| {
            if e.key() != key {
                return true;
            }
            let keep = !seen;
            seen = true;
            keep
        });
        self.counts.insert(key, 1);
    }

    /// Remove every header with this name. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let key = name.to_ascii_lowercase();
        let before = self.entries.len();
        self.entries.retain(|e| e.key() != key);
        self.counts.remove(&key);
        before - self.entries.len()
    }

    /// First value for a name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.value.as_str())
    }

    /// All values for a name, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.value.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HeaderEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for HeaderSet {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for HeaderSet {}

impl<'a> IntoIterator for &'a HeaderSet {
    type Item = &'a HeaderEntry;
    type IntoIter = std::slice::Iter<'a, HeaderEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
