//! Keyword vocabulary: which search keyword maps to which subfield tag.

use std::path::Path;

use citeweave_core::{LabelSet, OTHER_LABEL};

use crate::error::{Result, ScienceError};
use crate::normalize::normalize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyEntry {
    /// Keyword as written in the vocabulary file; used for searching.
    pub keyword: String,
    /// Normalized keyword; used for classification.
    pub normalized: String,
    pub tag: String,
}

impl VocabularyEntry {
    pub fn new(keyword: &str, tag: &str) -> Self {
        Self {
            keyword: keyword.trim().to_string(),
            normalized: normalize(keyword),
            tag: tag.trim().to_string(),
        }
    }

    /// Scans the title first, then the abstract, for the keyword.
    /// Returns the tag on a match, `OTHER` otherwise.
    pub fn classify(&self, title: &str, abstract_text: &str) -> &str {
        if self.normalized.is_empty() {
            return OTHER_LABEL;
        }
        if normalize(title).contains(&self.normalized)
            || normalize(abstract_text).contains(&self.normalized)
        {
            &self.tag
        } else {
            OTHER_LABEL
        }
    }

    pub fn label_for(&self, title: &str, abstract_text: &str) -> LabelSet {
        LabelSet::single(self.classify(title, abstract_text))
    }
}

/// Ordered `keyword : TAG` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    entries: Vec<VocabularyEntry>,
}

impl Vocabulary {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Blank lines and `#` comments are skipped. The tag follows the last `:`.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (keyword, tag) = line.rsplit_once(':').ok_or_else(|| {
                ScienceError::Parse(format!("vocabulary line {}: missing ':'", lineno + 1))
            })?;
            let entry = VocabularyEntry::new(keyword, tag);
            if entry.normalized.is_empty() || entry.tag.is_empty() {
                return Err(ScienceError::Parse(format!(
                    "vocabulary line {}: empty keyword or tag",
                    lineno + 1
                )));
            }
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "
        # metaheuristics
        particle swarm optimization : PSO
        genetic algorithm : GA
    ";

    #[test]
    fn parses_pairs_in_order() {
        let vocab = Vocabulary::parse(SAMPLE).unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.entries()[0].keyword, "particle swarm optimization");
        assert_eq!(vocab.entries()[0].tag, "PSO");
        assert_eq!(vocab.entries()[1].tag, "GA");
    }

    #[test]
    fn rejects_line_without_separator() {
        assert!(Vocabulary::parse("ant colony").is_err());
        assert!(Vocabulary::parse("ant colony : ").is_err());
    }

    #[test]
    fn title_match_sets_tag() {
        let pso = VocabularyEntry::new("particle swarm optimization", "PSO");
        assert_eq!(pso.classify("A Particle Swarm Optimisation variant", ""), "PSO");
        assert_eq!(
            pso.label_for("A Particle Swarm Optimisation variant", "").to_string(),
            "PSO"
        );
    }

    #[test]
    fn abstract_match_when_title_misses() {
        let pso = VocabularyEntry::new("particle swarm optimization", "PSO");
        assert_eq!(
            pso.classify("Swarm methods", "We apply particle-swarm optimization to scheduling."),
            "PSO"
        );
    }

    #[test]
    fn no_match_is_other() {
        let pso = VocabularyEntry::new("particle swarm optimization", "PSO");
        assert_eq!(pso.classify("Genetic algorithms", "Crossover and mutation."), "OTHER");
        assert!(pso.label_for("Genetic algorithms", "").is_other());
    }
}
