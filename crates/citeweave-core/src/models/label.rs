use std::fmt;

use serde::{Deserialize, Serialize};

use super::IdList;

/// Sentinel label for records that matched no vocabulary keyword.
pub const OTHER_LABEL: &str = "OTHER";

/// What [`LabelSet::add`] did to the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelChange {
    Unchanged,
    /// The `OTHER` sentinel was replaced by the new tag.
    Replaced,
    Appended,
}

/// Subfield tags of a publication, stored comma-joined (`"PSO,GA"`).
/// An empty set reads and writes as `OTHER`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct LabelSet {
    tags: IdList,
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::other()
    }
}

impl LabelSet {
    pub fn other() -> Self {
        Self { tags: IdList::new() }
    }

    pub fn single(tag: &str) -> Self {
        let mut set = Self::other();
        set.add(tag);
        set
    }

    pub fn parse(raw: &str) -> Self {
        let mut tags = IdList::parse(raw);
        tags.remove(OTHER_LABEL);
        Self { tags }
    }

    pub fn is_other(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn add(&mut self, tag: &str) -> LabelChange {
        if tag.trim().is_empty() || tag == OTHER_LABEL || self.contains(tag) {
            return LabelChange::Unchanged;
        }
        let was_other = self.is_other();
        self.tags.insert(tag);
        if was_other {
            LabelChange::Replaced
        } else {
            LabelChange::Appended
        }
    }

    /// Replaces tag `old` by `new`. Returns false when `old` is absent.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        if old == OTHER_LABEL || !self.tags.remove(old) {
            return false;
        }
        self.tags.insert(new);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter()
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_other() {
            f.write_str(OTHER_LABEL)
        } else {
            write!(f, "{}", self.tags)
        }
    }
}

impl From<String> for LabelSet {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<LabelSet> for String {
    fn from(set: LabelSet) -> Self {
        set.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_is_replaced_not_appended() {
        let mut labels = LabelSet::parse("OTHER");
        assert_eq!(labels.add("PSO"), LabelChange::Replaced);
        assert_eq!(labels.to_string(), "PSO");
    }

    #[test]
    fn existing_tag_is_unchanged() {
        let mut labels = LabelSet::parse("PSO,GA");
        assert_eq!(labels.add("GA"), LabelChange::Unchanged);
        assert_eq!(labels.add("ACO"), LabelChange::Appended);
        assert_eq!(labels.to_string(), "PSO,GA,ACO");
    }

    #[test]
    fn empty_reads_as_other() {
        assert!(LabelSet::parse("").is_other());
        assert_eq!(LabelSet::parse("").to_string(), "OTHER");
    }

    #[test]
    fn rename_is_tag_wise() {
        let mut labels = LabelSet::parse("GA,GAN");
        assert!(labels.rename("GA", "EA"));
        assert_eq!(labels.to_string(), "GAN,EA");
        assert!(!labels.rename("GA", "EA"));
    }

    #[test]
    fn rename_onto_existing_tag_does_not_duplicate() {
        let mut labels = LabelSet::parse("GA,EA");
        assert!(labels.rename("GA", "EA"));
        assert_eq!(labels.to_string(), "EA");
    }
}
