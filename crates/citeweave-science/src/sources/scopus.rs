//! Scopus search (JSON) and abstract-retrieval reference lists (XML).

use std::time::Duration;

use citeweave_core::{Affiliation, Eid, PartialDate};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Result, ScienceError};
use crate::http::{HttpResponse, RateLimitedClient};
use crate::raw::{RawAuthor, RawRecord, RawReference};
use crate::sources::{MetadataSource, ReferenceList, SearchPage, SearchRequest};

/// Scopus eids are `2-s2.0-` followed by the numeric id stored locally.
pub const EID_PREFIX: &str = "2-s2.0-";

pub fn parse_eid(raw: &str) -> Option<Eid> {
    let raw = raw.trim();
    raw.strip_prefix(EID_PREFIX).unwrap_or(raw).parse().ok()
}

pub fn format_eid(eid: Eid) -> String {
    format!("{EID_PREFIX}{eid}")
}

pub struct ScopusSource {
    client: RateLimitedClient,
    base_url: String,
    page_size: u32,
}

impl ScopusSource {
    pub fn new(api_key: &str, inst_token: Option<&str>) -> Result<Self> {
        Self::with_params(
            "https://api.elsevier.com",
            api_key,
            inst_token,
            Duration::from_millis(150),
            3,
            25,
        )
    }

    pub fn with_params(
        base_url: &str,
        api_key: &str,
        inst_token: Option<&str>,
        min_interval: Duration,
        max_retries: u32,
        page_size: u32,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("X-ELS-APIKey", header_value(api_key)?);
        if let Some(token) = inst_token {
            headers.insert("X-ELS-Insttoken", header_value(token)?);
        }

        let client =
            RateLimitedClient::with_headers(min_interval, max_retries, "citeweave/0.1", headers)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size,
        })
    }

    fn search_url(&self, request: &SearchRequest) -> String {
        let (query, sort) = match request {
            SearchRequest::Keyword { keyword, .. } => {
                (format!("TITLE(\"{keyword}\") OR ABS(\"{keyword}\")"), None)
            }
            SearchRequest::Citing { eid, .. } => {
                (format!("refeid({})", format_eid(*eid)), Some("citedby-count"))
            }
        };
        let mut url = format!(
            "{}/content/search/scopus?query={}&cursor={}&view=COMPLETE&count={}",
            self.base_url,
            urlencoding::encode(&query),
            urlencoding::encode(request.cursor()),
            self.page_size,
        );
        if let Some(sort) = sort {
            url.push_str("&sort=");
            url.push_str(sort);
        }
        url
    }
}

fn header_value(raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw).map_err(|e| ScienceError::Parse(format!("invalid header value: {e}")))
}

fn malformed(resp: &HttpResponse, reason: impl ToString) -> ScienceError {
    ScienceError::MalformedResponse {
        url: resp.url.clone(),
        reason: reason.to_string(),
        payload: resp.body.clone(),
    }
}

impl MetadataSource for ScopusSource {
    fn name(&self) -> &str {
        "Scopus"
    }

    fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let url = self.search_url(request);
        let resp = self.client.get(&url)?;
        let envelope: SearchEnvelope =
            serde_json::from_str(&resp.body).map_err(|e| malformed(&resp, e))?;
        let results = envelope.search_results;

        let (cursor_current, cursor_next) = match results.cursor {
            Some(c) => (c.current, c.next),
            None => (request.cursor().to_string(), String::new()),
        };
        let next_url = results
            .link
            .into_iter()
            .find(|l| l.rel == "next")
            .map(|l| l.href);
        // An empty result set comes back as a single entry carrying `error`.
        let records = results
            .entry
            .into_iter()
            .filter(|e| e.error.is_none())
            .map(WireEntry::into_raw)
            .collect();

        Ok(SearchPage {
            records,
            cursor_current,
            cursor_next,
            next_url,
            quota_remaining: resp.quota_remaining,
        })
    }

    fn references(&self, eid: Eid) -> Result<ReferenceList> {
        let url = format!(
            "{}/content/abstract/eid/{}?view=REF",
            self.base_url,
            format_eid(eid)
        );
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/xml"));
        let resp = self.client.get_with_headers(&url, headers)?;
        let mut list = parse_reference_xml(&resp.body).map_err(|e| malformed(&resp, e))?;
        list.quota_remaining = resp.quota_remaining;
        Ok(list)
    }
}

// ─── Search wire format ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(rename = "search-results")]
    search_results: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    cursor: Option<WireCursor>,
    #[serde(default)]
    link: Vec<WireLink>,
    #[serde(default)]
    entry: Vec<WireEntry>,
}

#[derive(Debug, Deserialize)]
struct WireCursor {
    #[serde(rename = "@current", default)]
    current: String,
    #[serde(rename = "@next", default)]
    next: String,
}

#[derive(Debug, Deserialize)]
struct WireLink {
    #[serde(rename = "@ref", default)]
    rel: String,
    #[serde(rename = "@href", default)]
    href: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireEntry {
    error: Option<String>,
    eid: Option<String>,
    #[serde(rename = "dc:title")]
    title: String,
    #[serde(rename = "dc:description")]
    description: String,
    #[serde(rename = "prism:doi")]
    doi: String,
    #[serde(rename = "prism:issn")]
    issn: String,
    #[serde(rename = "prism:volume")]
    volume: String,
    #[serde(rename = "prism:issueIdentifier")]
    issue: String,
    #[serde(rename = "prism:coverDate")]
    cover_date: String,
    #[serde(rename = "citedby-count", deserialize_with = "lenient_i64")]
    citedby: i64,
    #[serde(rename = "subtypeDescription")]
    subtype: String,
    #[serde(rename = "author-count")]
    author_count: Option<WireCount>,
    #[serde(rename = "prism:publicationName")]
    publication_name: String,
    #[serde(rename = "source-id", deserialize_with = "lenient_string")]
    source_id: String,
    #[serde(rename = "prism:url")]
    url: String,
    authkeywords: String,
    affiliation: Vec<WireAffiliation>,
    author: Vec<WireAuthor>,
}

#[derive(Debug, Default, Deserialize)]
struct WireCount {
    #[serde(rename = "@total", default, deserialize_with = "lenient_i64")]
    total: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireAffiliation {
    #[serde(deserialize_with = "lenient_string")]
    afid: String,
    affilname: String,
    #[serde(rename = "affiliation-city")]
    city: String,
    #[serde(rename = "affiliation-country")]
    country: String,
    #[serde(rename = "affiliation-url")]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireAuthor {
    #[serde(deserialize_with = "lenient_string")]
    authid: String,
    authname: String,
    surname: String,
    #[serde(rename = "given-name")]
    given_name: String,
    initials: String,
    afid: Vec<WireAfid>,
    #[serde(rename = "author-url")]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireAfid {
    #[serde(rename = "$", deserialize_with = "lenient_string")]
    value: String,
}

/// Counts arrive as strings (`"12"`), numbers, or null.
fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

impl WireEntry {
    fn into_raw(self) -> RawRecord {
        let affiliations = self
            .affiliation
            .into_iter()
            .filter_map(|a| {
                Some(Affiliation {
                    id: a.afid.trim().parse().ok()?,
                    name: a.affilname,
                    city: a.city,
                    country: a.country,
                    url: a.url,
                })
            })
            .collect();

        let authors = self
            .author
            .into_iter()
            .map(|a| RawAuthor {
                id: a.authid.trim().parse().ok(),
                name: a.authname,
                surname: a.surname,
                given_name: a.given_name,
                initials: a.initials,
                affiliation_ids: a
                    .afid
                    .iter()
                    .filter_map(|f| f.value.trim().parse().ok())
                    .collect(),
                url: a.url,
            })
            .collect();

        RawRecord {
            eid: self.eid.as_deref().and_then(parse_eid),
            title: self.title,
            abstract_text: self.description,
            doi: self.doi,
            issn: self.issn,
            volume: self.volume,
            issue: self.issue,
            cover_date: PartialDate::parse_opt(&self.cover_date),
            citedby: self.citedby,
            doc_type: self.subtype,
            author_count: self.author_count.map(|c| c.total).unwrap_or_default(),
            source: self.publication_name,
            source_id: self.source_id,
            url: self.url,
            author_keywords: self.authkeywords,
            authors,
            affiliations,
        }
    }
}

// ─── Reference list wire format ──────────────────────────────────────────────

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, name: &str) -> std::result::Result<Option<String>, String> {
    match e.try_get_attribute(name).map_err(|err| err.to_string())? {
        Some(attr) => Ok(Some(
            attr.unescape_value().map_err(|err| err.to_string())?.into_owned(),
        )),
        None => Ok(None),
    }
}

/// Parses an `abstracts-retrieval-response` in the REF view.
///
/// Elements are matched by local name, so `ce:doi` and `doi` are the same
/// field. Unknown elements are ignored.
pub fn parse_reference_xml(xml: &str) -> std::result::Result<ReferenceList, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut list = ReferenceList::default();
    let mut reference: Option<RawReference> = None;
    let mut author: Option<RawAuthor> = None;
    let mut saw_root = false;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match local_name(e).as_str() {
                "abstracts-retrieval-response" => saw_root = true,
                "references" => {
                    let total = attribute(e, "total-references")?
                        .and_then(|t| t.trim().parse().ok())
                        .unwrap_or_default();
                    list.total = Some(total);
                }
                "reference" => {
                    reference = Some(RawReference::default());
                    text.clear();
                }
                "author" if reference.is_some() => {
                    author = Some(RawAuthor {
                        id: attribute(e, "auid")?.and_then(|v| v.trim().parse().ok()),
                        ..Default::default()
                    });
                    text.clear();
                }
                "affiliation" => push_affiliation(&mut author, e)?,
                "author-list" => text.clear(),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match local_name(e).as_str() {
                "affiliation" => push_affiliation(&mut author, e)?,
                "references" => {
                    let total = attribute(e, "total-references")?
                        .and_then(|t| t.trim().parse().ok())
                        .unwrap_or_default();
                    list.total = Some(total);
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                let t = e.unescape().map_err(|err| err.to_string())?;
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&t);
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let value = std::mem::take(&mut text);
                if let Some(a) = author.as_mut() {
                    match name.as_str() {
                        "initials" => a.initials = value,
                        "indexed-name" => a.name = value,
                        "surname" => a.surname = value,
                        "given-name" => a.given_name = value,
                        "author-url" => a.url = value,
                        "author" => {
                            if let (Some(r), Some(done)) = (reference.as_mut(), author.take()) {
                                r.authors.push(done);
                            }
                        }
                        // Inline markup inside a field keeps accumulating.
                        _ => text = value,
                    }
                } else if let Some(r) = reference.as_mut() {
                    match name.as_str() {
                        "scopus-id" => r.id = value.trim().parse().ok(),
                        "title" => r.title = Some(value).filter(|t| !t.is_empty()),
                        "url" => r.url = value,
                        "type" => r.reference_type = value,
                        "doi" => {
                            if r.doi.is_empty() {
                                r.doi = value;
                            }
                        }
                        "sourcetitle" => r.source = value,
                        "citedby-count" => r.citedby = value.trim().parse().unwrap_or_default(),
                        "coverDate" => r.date = PartialDate::parse_opt(&value),
                        "reference" => {
                            if let Some(done) = reference.take() {
                                list.entries.push(done);
                            }
                        }
                        "author-list" => {}
                        _ => text = value,
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err("missing abstracts-retrieval-response element".to_string());
    }
    Ok(list)
}

fn push_affiliation(
    author: &mut Option<RawAuthor>,
    e: &BytesStart<'_>,
) -> std::result::Result<(), String> {
    if let Some(a) = author.as_mut()
        && let Some(id) = attribute(e, "id")?.and_then(|v| v.trim().parse().ok())
        && !a.affiliation_ids.contains(&id)
    {
        a.affiliation_ids.push(id);
    }
    Ok(())
}
