use std::fmt;

use serde::{Deserialize, Serialize};

/// A comma-joined set of identifiers as stored in list columns
/// (`authors`, `cites`, `referenced_by`, `aka`, ...).
///
/// Parsing drops empty fragments and repeated entries, so `",1,,1,2"`
/// reads back as `1,2`. Insertion order of first occurrence is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct IdList {
    items: Vec<String>,
}

impl IdList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Self {
        let mut list = Self::new();
        for part in raw.split(',') {
            list.insert(part);
        }
        list
    }

    pub fn from_ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        let mut list = Self::new();
        for id in ids {
            list.insert(&id.to_string());
        }
        list
    }

    /// Adds `id` unless it is empty or already present. Returns whether it was added.
    pub fn insert(&mut self, id: &str) -> bool {
        let id = id.trim();
        if id.is_empty() || self.contains(id) {
            return false;
        }
        self.items.push(id.to_string());
        true
    }

    pub fn insert_id(&mut self, id: i64) -> bool {
        self.insert(&id.to_string())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|x| x != id.trim());
        before != self.items.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        let id = id.trim();
        self.items.iter().any(|x| x == id)
    }

    pub fn contains_id(&self, id: i64) -> bool {
        self.contains(&id.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    /// Entries that parse as integer ids. Non-numeric fragments are skipped.
    pub fn ids(&self) -> Vec<i64> {
        self.items.iter().filter_map(|x| x.parse().ok()).collect()
    }

    /// Set equality, ignoring order.
    pub fn same_members(&self, other: &IdList) -> bool {
        self.len() == other.len() && self.iter().all(|x| other.contains(x))
    }
}

impl fmt::Display for IdList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.items.join(","))
    }
}

impl From<String> for IdList {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&str> for IdList {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<IdList> for String {
    fn from(list: IdList) -> Self {
        list.to_string()
    }
}

impl<'a> IntoIterator for &'a IdList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_drops_empty_and_duplicate_entries() {
        let list = IdList::parse(",1,,2,1, 3 ,");
        assert_eq!(list.to_string(), "1,2,3");
        assert_eq!(list.ids(), vec![1, 2, 3]);
    }

    #[test]
    fn insert_into_empty_has_no_leading_comma() {
        let mut list = IdList::parse("");
        assert!(list.is_empty());
        assert!(list.insert_id(100));
        assert_eq!(list.to_string(), "100");
    }

    #[test]
    fn insert_is_deduplicated() {
        let mut list = IdList::parse("5,6");
        assert!(!list.insert("6"));
        assert!(list.insert("7"));
        assert_eq!(list.to_string(), "5,6,7");
    }

    #[test]
    fn same_members_ignores_order() {
        let a = IdList::parse("1,2,3");
        let b = IdList::parse("3,1,2");
        let c = IdList::parse("1,2");
        assert!(a.same_members(&b));
        assert!(!a.same_members(&c));
    }

    #[test]
    fn remove_entry() {
        let mut list = IdList::parse("1,2,3");
        assert!(list.remove("2"));
        assert!(!list.remove("9"));
        assert_eq!(list.to_string(), "1,3");
    }

    #[test]
    fn serde_uses_joined_string() {
        let list = IdList::parse("4,5");
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, "\"4,5\"");
        let back: IdList = serde_json::from_str(&json).unwrap();
        assert_eq!(back, list);
    }
}
