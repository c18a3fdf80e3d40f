use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CiteweaveError;

/// A cover date with optional month and day, as sources report it
/// (`2020`, `2020-03`, `2020-03-15`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartialDate {
    pub year: i32,
    pub month: Option<u8>,
    pub day: Option<u8>,
}

impl PartialDate {
    pub fn new(year: i32, month: Option<u8>, day: Option<u8>) -> Self {
        Self { year, month, day }
    }

    /// Parses leniently: blank input is `None`, and so is anything without a year.
    pub fn parse_opt(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }

    /// True when year and month are equal. A known month never matches an
    /// unknown one; two year-only dates match on the year.
    pub fn same_month(&self, other: &PartialDate) -> bool {
        self.year == other.year && self.month == other.month
    }

    /// Compares at the precision both dates share.
    pub fn cmp_shared(&self, other: &PartialDate) -> Ordering {
        self.year
            .cmp(&other.year)
            .then_with(|| match (self.month, other.month) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => Ordering::Equal,
            })
            .then_with(|| match (self.day, other.day) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => Ordering::Equal,
            })
    }
}

impl FromStr for PartialDate {
    type Err = CiteweaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CiteweaveError::InvalidDate(s.to_string());
        let mut parts = s.trim().splitn(3, '-');

        let year = parts
            .next()
            .filter(|p| !p.is_empty())
            .and_then(|p| p.parse::<i32>().ok())
            .ok_or_else(invalid)?;
        let month = match parts.next() {
            Some(p) => Some(p.parse::<u8>().ok().filter(|m| (1..=12).contains(m)).ok_or_else(invalid)?),
            None => None,
        };
        let day = match parts.next() {
            Some(p) => Some(p.parse::<u8>().ok().filter(|d| (1..=31).contains(d)).ok_or_else(invalid)?),
            None => None,
        };

        Ok(Self { year, month, day })
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(m) = self.month {
            write!(f, "-{m:02}")?;
            if let Some(d) = self.day {
                write!(f, "-{d:02}")?;
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for PartialDate {
    type Error = CiteweaveError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PartialDate> for String {
    fn from(d: PartialDate) -> Self {
        d.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_precision() {
        assert_eq!("2020".parse::<PartialDate>().unwrap(), PartialDate::new(2020, None, None));
        assert_eq!("2020-03".parse::<PartialDate>().unwrap(), PartialDate::new(2020, Some(3), None));
        assert_eq!(
            "2020-03-15".parse::<PartialDate>().unwrap(),
            PartialDate::new(2020, Some(3), Some(15))
        );
        assert_eq!(PartialDate::new(2020, Some(3), Some(15)).to_string(), "2020-03-15");
    }

    #[test]
    fn blank_or_garbage_is_none() {
        assert_eq!(PartialDate::parse_opt(""), None);
        assert_eq!(PartialDate::parse_opt("soon"), None);
        assert_eq!(PartialDate::parse_opt("2020-13-01"), None);
    }

    #[test]
    fn same_month_needs_both_months() {
        let full = PartialDate::parse_opt("2020-03-15").unwrap();
        assert!(full.same_month(&PartialDate::parse_opt("2020-03-01").unwrap()));
        assert!(!full.same_month(&PartialDate::parse_opt("2020").unwrap()));
        assert!(!full.same_month(&PartialDate::parse_opt("2019-03-15").unwrap()));
        assert!(!full.same_month(&PartialDate::parse_opt("2020-04-15").unwrap()));

        let year = PartialDate::parse_opt("2020").unwrap();
        assert!(year.same_month(&PartialDate::parse_opt("2020").unwrap()));
    }

    #[test]
    fn shared_precision_ordering() {
        let a = PartialDate::parse_opt("2020-03").unwrap();
        let b = PartialDate::parse_opt("2020-03-20").unwrap();
        assert_eq!(a.cmp_shared(&b), Ordering::Equal);
        let c = PartialDate::parse_opt("2019-12-31").unwrap();
        assert_eq!(c.cmp_shared(&b), Ordering::Less);
    }
}
