use std::time::Duration;

use citeweave_core::PartialDate;
use serde_json::Value;

use crate::error::{Result, ScienceError};
use crate::http::RateLimitedClient;

/// CrossRef works API, used to back-fill pending records that only have a DOI.
pub struct CrossRefSource {
    client: RateLimitedClient,
    base_url: String,
}

impl CrossRefSource {
    pub fn new(polite_email: Option<String>) -> Result<Self> {
        Self::with_params(
            "https://api.crossref.org",
            Duration::from_millis(100),
            polite_email,
        )
    }

    pub fn with_params(
        base_url: &str,
        min_interval: Duration,
        polite_email: Option<String>,
    ) -> Result<Self> {
        let user_agent = match &polite_email {
            Some(email) => format!("citeweave/0.1 (mailto:{email})"),
            None => "citeweave/0.1".to_string(),
        };

        let client = RateLimitedClient::new(min_interval, 3, &user_agent)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `Ok(None)` when CrossRef does not know the DOI.
    pub fn fetch_by_doi(&self, doi: &str) -> Result<Option<CrossRefWork>> {
        let url = format!("{}/works/{}", self.base_url, doi.trim());
        let resp = match self.client.get(&url) {
            Ok(resp) => resp,
            Err(ScienceError::IdentifierNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let val: Value = serde_json::from_str(&resp.body).map_err(|e| {
            ScienceError::MalformedResponse {
                url: url.clone(),
                reason: e.to_string(),
                payload: resp.body.clone(),
            }
        })?;

        CrossRefWork::from_json(&val["message"]).map(Some)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossRefWork {
    pub doi: String,
    pub title: String,
    pub authors: Vec<CrossRefAuthor>,
    pub published: Option<PartialDate>,
    pub container_title: String,
    pub citation_count: i64,
    pub reference_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossRefAuthor {
    pub given: String,
    pub family: String,
}

impl CrossRefAuthor {
    fn from_json(v: &Value) -> Option<Self> {
        let family = v["family"]
            .as_str()
            .or_else(|| v["name"].as_str())?
            .to_string();
        let given = v["given"].as_str().unwrap_or_default().to_string();
        Some(Self { given, family })
    }

    pub fn initials(&self) -> String {
        derive_initials(&self.given)
    }

    /// Indexed form, `Surname I.`
    pub fn display_name(&self) -> String {
        let initials = self.initials();
        if initials.is_empty() {
            self.family.clone()
        } else {
            format!("{} {initials}", self.family)
        }
    }
}

impl CrossRefWork {
    pub fn from_json(v: &Value) -> Result<Self> {
        let doi = v["DOI"]
            .as_str()
            .ok_or_else(|| ScienceError::Parse("Missing DOI in CrossRef response".to_string()))?
            .to_string();

        let title = match &v["title"] {
            Value::Array(a) => a.iter().find_map(|t| t.as_str()).unwrap_or_default().to_string(),
            Value::String(s) => s.clone(),
            _ => String::new(),
        };

        let authors = v["author"]
            .as_array()
            .map(|a| a.iter().filter_map(CrossRefAuthor::from_json).collect())
            .unwrap_or_default();

        let container_title = match &v["container-title"] {
            Value::Array(a) => a.iter().filter_map(|t| t.as_str()).collect::<Vec<_>>().join(";"),
            Value::String(s) => s.clone(),
            _ => String::new(),
        };

        Ok(Self {
            doi,
            title,
            authors,
            published: parse_date(v),
            container_title,
            citation_count: v["is-referenced-by-count"].as_i64().unwrap_or_default(),
            reference_count: v["reference-count"].as_i64(),
        })
    }
}

fn parse_date(v: &Value) -> Option<PartialDate> {
    // "published": {"date-parts": [[2017, 6, 12]]}
    ["published", "published-print", "published-online", "issued"]
        .iter()
        .find_map(|key| {
            let parts = v[*key]["date-parts"][0].as_array()?;
            let year = parts.first()?.as_i64()? as i32;
            let month = parts.get(1).and_then(Value::as_u64).map(|m| m as u8);
            let day = month.and(parts.get(2).and_then(Value::as_u64).map(|d| d as u8));
            Some(PartialDate::new(year, month, day))
        })
}

/// `"John Ronald"` -> `"J.R."`, `"Jean-Pierre"` -> `"J.-P."`. Parts that
/// already end in `.` are kept as written.
pub fn derive_initials(given: &str) -> String {
    fn initial(part: &str) -> String {
        if part.ends_with('.') {
            part.to_string()
        } else {
            part.chars().next().map(|c| format!("{c}.")).unwrap_or_default()
        }
    }

    given
        .split_whitespace()
        .map(|name| {
            name.split('-')
                .filter(|p| !p.is_empty())
                .map(initial)
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[test]
    fn test_crossref_fetch_by_doi() {
        let mut server = Server::new();
        let base_url = server.url();

        let _m = server
            .mock("GET", "/works/10.1038/nature14539")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                "status": "ok",
                "message": {
                    "DOI": "10.1038/nature14539",
                    "title": ["Human-level control through deep reinforcement learning"],
                    "author": [
                        {"given": "Volodymyr", "family": "Mnih"},
                        {"given": "Jean-Pierre K.", "family": "Dupont"}
                    ],
                    "published": {"date-parts": [[2015, 2, 26]]},
                    "container-title": ["Nature"],
                    "is-referenced-by-count": 20000
                }
            }"#,
            )
            .create();

        let source = CrossRefSource::with_params(&base_url, Duration::from_secs(0), None).unwrap();
        let work = source.fetch_by_doi("10.1038/nature14539").unwrap().unwrap();

        assert_eq!(work.title, "Human-level control through deep reinforcement learning");
        assert_eq!(work.published, PartialDate::parse_opt("2015-02-26"));
        assert_eq!(work.container_title, "Nature");
        assert_eq!(work.citation_count, 20000);
        assert_eq!(work.authors.len(), 2);
        assert_eq!(work.authors[0].display_name(), "Mnih V.");
        assert_eq!(work.authors[1].initials(), "J.-P.K.");
    }

    #[test]
    fn test_unknown_doi_is_none() {
        let mut server = Server::new();
        let _m = server.mock("GET", "/works/10.1/missing").with_status(404).create();

        let source =
            CrossRefSource::with_params(&server.url(), Duration::from_secs(0), None).unwrap();
        assert_eq!(source.fetch_by_doi("10.1/missing").unwrap(), None);
    }

    #[test]
    fn test_initials() {
        assert_eq!(derive_initials("John Ronald"), "J.R.");
        assert_eq!(derive_initials("Jean-Pierre"), "J.-P.");
        assert_eq!(derive_initials("J. Robert"), "J.R.");
        assert_eq!(derive_initials("Ž."), "Ž.");
        assert_eq!(derive_initials(""), "");
    }

    #[test]
    fn test_year_only_date() {
        let v: Value = serde_json::json!({
            "DOI": "10.1/y",
            "issued": {"date-parts": [[1999]]}
        });
        let work = CrossRefWork::from_json(&v).unwrap();
        assert_eq!(work.published, Some(PartialDate::new(1999, None, None)));
        assert_eq!(work.title, "");
        assert_eq!(work.citation_count, 0);
    }
}
