//! Read-only citation graphs over the store and their descriptive statistics.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use citeweave_core::{AuthorId, Eid, IdList, LabelSet, OTHER_LABEL, RecordStore};
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone)]
struct Node {
    label: String,
    authors: IdList,
}

/// Paper citation graph: publications and pending records as nodes, an
/// edge `a -> b` when `a` cites `b`. Parallel edges collapse.
#[derive(Debug, Clone, Default)]
pub struct CitationGraph {
    nodes: BTreeMap<Eid, Node>,
    edges: BTreeSet<(Eid, Eid)>,
}

impl CitationGraph {
    pub fn build(store: &dyn RecordStore) -> Result<Self> {
        let publications = store.list_publications()?;
        let pending = store.list_pending()?;

        let mut graph = Self::default();
        for p in &publications {
            graph.nodes.insert(
                p.eid,
                Node {
                    label: p.label.to_string(),
                    authors: p.authors.clone(),
                },
            );
        }
        for r in &pending {
            graph.nodes.entry(r.id).or_insert_with(|| Node {
                label: OTHER_LABEL.to_string(),
                authors: r.authors.clone(),
            });
        }

        for p in &publications {
            for cited in p.cites.ids() {
                graph.add_edge(p.eid, cited);
            }
        }
        for r in &pending {
            for citer in r.referenced_by.ids() {
                graph.add_edge(citer, r.id);
            }
        }
        Ok(graph)
    }

    fn add_edge(&mut self, from: Eid, to: Eid) {
        if from != to && self.nodes.contains_key(&from) && self.nodes.contains_key(&to) {
            self.edges.insert((from, to));
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn in_degrees(&self) -> BTreeMap<Eid, usize> {
        let mut degrees: BTreeMap<Eid, usize> = self.nodes.keys().map(|&id| (id, 0)).collect();
        for (_, to) in &self.edges {
            *degrees.entry(*to).or_default() += 1;
        }
        degrees
    }

    pub fn out_degrees(&self) -> BTreeMap<Eid, usize> {
        let mut degrees: BTreeMap<Eid, usize> = self.nodes.keys().map(|&id| (id, 0)).collect();
        for (from, _) in &self.edges {
            *degrees.entry(*from).or_default() += 1;
        }
        degrees
    }

    /// Edges whose endpoints share at least one author id.
    pub fn self_citations(&self) -> usize {
        self.edges
            .iter()
            .filter(|(from, to)| match (self.nodes.get(from), self.nodes.get(to)) {
                (Some(a), Some(b)) => a.authors.iter().any(|id| b.authors.contains(id)),
                _ => false,
            })
            .count()
    }

    /// Share of each label's outgoing edges that land on each label.
    pub fn label_mixing(&self) -> Vec<LabelMixing> {
        mixing(self.edges.iter().filter_map(|(from, to)| {
            let (a, b) = (self.nodes.get(from)?, self.nodes.get(to)?);
            Some((a.label.as_str(), b.label.as_str(), 1))
        }))
    }

    pub fn label_degrees(&self) -> Vec<LabelDegrees> {
        let in_deg = self.in_degrees();
        let out_deg = self.out_degrees();
        label_degrees(self.nodes.iter().map(|(id, node)| {
            (
                node.label.as_str(),
                in_deg.get(id).copied().unwrap_or_default(),
                out_deg.get(id).copied().unwrap_or_default(),
            )
        }))
    }

    /// Projects the paper graph onto authors: every paper edge adds one
    /// to the weight of each (citing author, cited author) pair, an
    /// author citing their own work included. Each author is labelled
    /// with the tags of the papers they wrote, or `OTHER` when none carry
    /// one.
    pub fn author_graph(&self) -> AuthorCitationGraph {
        let mut tags: BTreeMap<AuthorId, BTreeSet<String>> = BTreeMap::new();
        for node in self.nodes.values() {
            let label = LabelSet::parse(&node.label);
            for author in node.authors.ids() {
                let entry = tags.entry(author).or_default();
                if !label.is_other() {
                    entry.extend(label.iter().map(str::to_string));
                }
            }
        }
        let labels = tags
            .into_iter()
            .map(|(id, tags)| {
                let label = if tags.is_empty() {
                    OTHER_LABEL.to_string()
                } else {
                    tags.into_iter().collect::<Vec<_>>().join(",")
                };
                (id, label)
            })
            .collect();

        let mut weights: BTreeMap<(AuthorId, AuthorId), usize> = BTreeMap::new();
        for (from, to) in &self.edges {
            let (Some(a), Some(b)) = (self.nodes.get(from), self.nodes.get(to)) else {
                continue;
            };
            for citing in a.authors.ids() {
                for cited in b.authors.ids() {
                    *weights.entry((citing, cited)).or_default() += 1;
                }
            }
        }

        AuthorCitationGraph { labels, weights }
    }

    pub fn stats(&self) -> GraphStats {
        let ins: Vec<usize> = self.in_degrees().into_values().collect();
        let outs: Vec<usize> = self.out_degrees().into_values().collect();
        GraphStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            in_degree: DegreeSummary::of(&ins),
            out_degree: DegreeSummary::of(&outs),
            labels: self.label_degrees(),
            mixing: self.label_mixing(),
            self_citations: self.self_citations(),
        }
    }
}

/// Weighted author-to-author citation graph, see
/// [`CitationGraph::author_graph`].
#[derive(Debug, Clone, Default)]
pub struct AuthorCitationGraph {
    labels: BTreeMap<AuthorId, String>,
    weights: BTreeMap<(AuthorId, AuthorId), usize>,
}

impl AuthorCitationGraph {
    pub fn build(store: &dyn RecordStore) -> Result<Self> {
        Ok(CitationGraph::build(store)?.author_graph())
    }

    pub fn node_count(&self) -> usize {
        self.labels.len()
    }

    pub fn edge_count(&self) -> usize {
        self.weights.len()
    }

    /// Sum of all edge weights.
    pub fn total_weight(&self) -> usize {
        self.weights.values().sum()
    }

    pub fn weight(&self, citing: AuthorId, cited: AuthorId) -> usize {
        self.weights.get(&(citing, cited)).copied().unwrap_or_default()
    }

    pub fn label(&self, author: AuthorId) -> Option<&str> {
        self.labels.get(&author).map(String::as_str)
    }

    /// Distinct citing authors per author; a self-loop counts.
    pub fn in_degrees(&self) -> BTreeMap<AuthorId, usize> {
        let mut degrees: BTreeMap<AuthorId, usize> = self.labels.keys().map(|&id| (id, 0)).collect();
        for (_, to) in self.weights.keys() {
            *degrees.entry(*to).or_default() += 1;
        }
        degrees
    }

    pub fn out_degrees(&self) -> BTreeMap<AuthorId, usize> {
        let mut degrees: BTreeMap<AuthorId, usize> = self.labels.keys().map(|&id| (id, 0)).collect();
        for (from, _) in self.weights.keys() {
            *degrees.entry(*from).or_default() += 1;
        }
        degrees
    }

    /// Label-to-label citation shares, counted by edge weight.
    pub fn label_mixing(&self) -> Vec<LabelMixing> {
        mixing(self.weights.iter().filter_map(|((from, to), &weight)| {
            Some((self.label(*from)?, self.label(*to)?, weight))
        }))
    }

    pub fn label_degrees(&self) -> Vec<LabelDegrees> {
        let in_deg = self.in_degrees();
        let out_deg = self.out_degrees();
        label_degrees(self.labels.iter().map(|(id, label)| {
            (
                label.as_str(),
                in_deg.get(id).copied().unwrap_or_default(),
                out_deg.get(id).copied().unwrap_or_default(),
            )
        }))
    }

    pub fn stats(&self) -> AuthorGraphStats {
        let ins: Vec<usize> = self.in_degrees().into_values().collect();
        let outs: Vec<usize> = self.out_degrees().into_values().collect();
        let weights: Vec<usize> = self.weights.values().copied().collect();
        AuthorGraphStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            total_weight: self.total_weight(),
            in_degree: DegreeSummary::of(&ins),
            out_degree: DegreeSummary::of(&outs),
            edge_weight: DegreeSummary::of(&weights),
            labels: self.label_degrees(),
            mixing: self.label_mixing(),
        }
    }
}

/// Sums `(from, to, weight)` triples per label pair and turns them into
/// outgoing and incoming shares.
fn mixing<'a>(edges: impl IntoIterator<Item = (&'a str, &'a str, usize)>) -> Vec<LabelMixing> {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    let mut leaving: BTreeMap<&str, usize> = BTreeMap::new();
    let mut arriving: BTreeMap<&str, usize> = BTreeMap::new();
    for (from, to, weight) in edges {
        *counts.entry((from, to)).or_default() += weight;
        *leaving.entry(from).or_default() += weight;
        *arriving.entry(to).or_default() += weight;
    }

    counts
        .into_iter()
        .map(|((from, to), edges)| {
            let out_total = leaving.get(from).copied().unwrap_or(edges);
            let in_total = arriving.get(to).copied().unwrap_or(edges);
            LabelMixing {
                from: from.to_string(),
                to: to.to_string(),
                edges,
                proportion: edges as f64 / out_total as f64,
                incoming_proportion: edges as f64 / in_total as f64,
            }
        })
        .collect()
}

/// Groups `(label, in-degree, out-degree)` rows by label.
fn label_degrees<'a>(rows: impl IntoIterator<Item = (&'a str, usize, usize)>) -> Vec<LabelDegrees> {
    let mut by_label: BTreeMap<&str, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
    for (label, in_degree, out_degree) in rows {
        let entry = by_label.entry(label).or_default();
        entry.0.push(in_degree);
        entry.1.push(out_degree);
    }

    by_label
        .into_iter()
        .map(|(label, (ins, outs))| LabelDegrees {
            label: label.to_string(),
            size: ins.len(),
            in_degree: Moments::of(&ins),
            out_degree: Moments::of(&outs),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub in_degree: DegreeSummary,
    pub out_degree: DegreeSummary,
    pub labels: Vec<LabelDegrees>,
    pub mixing: Vec<LabelMixing>,
    pub self_citations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorGraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub total_weight: usize,
    pub in_degree: DegreeSummary,
    pub out_degree: DegreeSummary,
    pub edge_weight: DegreeSummary,
    pub labels: Vec<LabelDegrees>,
    pub mixing: Vec<LabelMixing>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DegreeSummary {
    pub max: usize,
    pub mean: f64,
    pub stdev: f64,
    pub mode: usize,
    /// Fraction of nodes whose degree equals the mode.
    pub mode_share: f64,
}

impl DegreeSummary {
    pub fn of(degrees: &[usize]) -> Self {
        if degrees.is_empty() {
            return Self::default();
        }
        let mut freq: BTreeMap<usize, usize> = BTreeMap::new();
        for &d in degrees {
            *freq.entry(d).or_default() += 1;
        }
        // smallest degree wins a tie
        let (mode, count) = freq
            .iter()
            .max_by_key(|&(&degree, &count)| (count, Reverse(degree)))
            .map(|(&d, &c)| (d, c))
            .unwrap_or_default();
        let moments = Moments::of(degrees);

        Self {
            max: degrees.iter().copied().max().unwrap_or_default(),
            mean: moments.mean,
            stdev: moments.stdev,
            mode,
            mode_share: count as f64 / degrees.len() as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Moments {
    pub mean: f64,
    /// Sample standard deviation; zero below two observations.
    pub stdev: f64,
    pub total: usize,
}

impl Moments {
    pub fn of(values: &[usize]) -> Self {
        let n = values.len();
        if n == 0 {
            return Self::default();
        }
        let total: usize = values.iter().sum();
        let mean = total as f64 / n as f64;
        let stdev = if n < 2 {
            0.0
        } else {
            let ss: f64 = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        };
        Self { mean, stdev, total }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelDegrees {
    pub label: String,
    pub size: usize,
    pub in_degree: Moments,
    pub out_degree: Moments,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelMixing {
    pub from: String,
    pub to: String,
    /// Edge count, or summed edge weight on the author graph.
    pub edges: usize,
    /// Share of everything leaving `from`.
    pub proportion: f64,
    /// Share of everything arriving at `to`.
    pub incoming_proportion: f64,
}
