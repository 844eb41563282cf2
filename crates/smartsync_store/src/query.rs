//! Query specifications and value matching.

use crate::error::{StoreError, StoreResult};
use crate::store::{project, SOUP_ENTRY_ID};
use serde_json::Value;
use std::cmp::Ordering;

/// Sort order for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Smallest values first.
    #[default]
    Ascending,
    /// Largest values first.
    Descending,
}

/// The predicate part of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    /// Every record in the soup.
    All,
    /// Records whose value at `path` equals `value`.
    Exact {
        /// Dotted path.
        path: String,
        /// Value to match.
        value: Value,
    },
    /// Records whose value at `path` lies in `[begin, end]`.
    ///
    /// A missing bound leaves that side open.
    Range {
        /// Dotted path.
        path: String,
        /// Inclusive lower bound.
        begin: Option<Value>,
        /// Inclusive upper bound.
        end: Option<Value>,
    },
    /// Records whose value at `path` matches a SQL `LIKE` pattern.
    Like {
        /// Dotted path.
        path: String,
        /// Pattern using `%` and `_` wildcards, matched case-insensitively.
        pattern: String,
    },
    /// Records whose text at `path` contains every word of `term`.
    ///
    /// Words are runs of letters and digits compared case-insensitively.
    /// A term word ending in `*` matches any word it prefixes. The soup
    /// needs a full-text index on `path`.
    Match {
        /// Dotted path.
        path: String,
        /// Words to look for.
        term: String,
    },
}

/// A paged query against one soup.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Soup to query.
    pub soup_name: String,
    /// Predicate.
    pub kind: QueryKind,
    /// Path to order by; `None` orders by soup entry id.
    pub order_path: Option<String>,
    /// Sort order.
    pub order: Order,
    /// Number of records per page.
    pub page_size: usize,
}

impl QuerySpec {
    fn build(soup_name: impl Into<String>, kind: QueryKind, page_size: usize) -> StoreResult<Self> {
        let soup_name = soup_name.into();
        if soup_name.is_empty() {
            return Err(StoreError::invalid_query("soup name must not be empty"));
        }
        if page_size == 0 {
            return Err(StoreError::invalid_query("page size must be positive"));
        }
        Ok(Self {
            soup_name,
            kind,
            order_path: None,
            order: Order::Ascending,
            page_size,
        })
    }

    /// Query returning every record of a soup.
    pub fn all(soup_name: impl Into<String>, page_size: usize) -> StoreResult<Self> {
        Self::build(soup_name, QueryKind::All, page_size)
    }

    /// Query matching records whose `path` equals `value`.
    pub fn exact(
        soup_name: impl Into<String>,
        path: impl Into<String>,
        value: Value,
        page_size: usize,
    ) -> StoreResult<Self> {
        let kind = QueryKind::Exact {
            path: path.into(),
            value,
        };
        Self::build(soup_name, kind, page_size)
    }

    /// Query matching records whose `path` lies between `begin` and `end`.
    pub fn range(
        soup_name: impl Into<String>,
        path: impl Into<String>,
        begin: Option<Value>,
        end: Option<Value>,
        page_size: usize,
    ) -> StoreResult<Self> {
        let kind = QueryKind::Range {
            path: path.into(),
            begin,
            end,
        };
        Self::build(soup_name, kind, page_size)
    }

    /// Query matching records whose `path` is `LIKE` the pattern.
    pub fn like(
        soup_name: impl Into<String>,
        path: impl Into<String>,
        pattern: impl Into<String>,
        page_size: usize,
    ) -> StoreResult<Self> {
        let kind = QueryKind::Like {
            path: path.into(),
            pattern: pattern.into(),
        };
        Self::build(soup_name, kind, page_size)
    }

    /// Query matching records whose full-text indexed `path` contains
    /// every word of `term`.
    pub fn match_text(
        soup_name: impl Into<String>,
        path: impl Into<String>,
        term: impl Into<String>,
        page_size: usize,
    ) -> StoreResult<Self> {
        let term = term.into();
        if term_words(&term).is_empty() {
            return Err(StoreError::invalid_query("match term has no words"));
        }
        let kind = QueryKind::Match {
            path: path.into(),
            term,
        };
        Self::build(soup_name, kind, page_size)
    }

    /// Path that must carry a full-text index for this query to run.
    pub fn full_text_path(&self) -> Option<&str> {
        match &self.kind {
            QueryKind::Match { path, .. } => Some(path.as_str()),
            _ => None,
        }
    }

    /// Sets the ordering of results.
    pub fn order_by(mut self, path: impl Into<String>, order: Order) -> Self {
        self.order_path = Some(path.into());
        self.order = order;
        self
    }

    /// Returns true if the record satisfies the predicate.
    pub fn matches(&self, record: &Value) -> bool {
        match &self.kind {
            QueryKind::All => true,
            QueryKind::Exact { path, value } => project(record, path) == Some(value),
            QueryKind::Range { path, begin, end } => {
                let Some(actual) = project(record, path) else {
                    return false;
                };
                if actual.is_null() {
                    return false;
                }
                let above = begin
                    .as_ref()
                    .map_or(true, |b| compare_values(Some(actual), Some(b)) != Ordering::Less);
                let below = end
                    .as_ref()
                    .map_or(true, |e| compare_values(Some(actual), Some(e)) != Ordering::Greater);
                above && below
            }
            QueryKind::Like { path, pattern } => match project(record, path) {
                Some(Value::String(s)) => like_matches(pattern, s),
                Some(Value::Number(n)) => like_matches(pattern, &n.to_string()),
                _ => false,
            },
            QueryKind::Match { path, term } => match project(record, path) {
                Some(Value::String(s)) => text_matches(term, s),
                _ => false,
            },
        }
    }

    /// Sorts matching records according to the spec's ordering.
    pub(crate) fn sort(&self, records: &mut [Value]) {
        let path = self.order_path.as_deref().unwrap_or(SOUP_ENTRY_ID);
        records.sort_by(|a, b| {
            let ordering = compare_values(project(a, path), project(b, path));
            match self.order {
                Order::Ascending => ordering,
                Order::Descending => ordering.reverse(),
            }
        });
    }
}

/// Total order over optional JSON values.
///
/// Missing and null sort first, then booleans, numbers, strings, and
/// finally arrays and objects (compared by their JSON text).
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => {
                    let x = x.as_f64().unwrap_or(f64::NAN);
                    let y = y.as_f64().unwrap_or(f64::NAN);
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
            }
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x @ Value::Array(_)), Some(y @ Value::Array(_)))
        | (Some(x @ Value::Object(_)), Some(y @ Value::Object(_))) => {
            x.to_string().cmp(&y.to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// SQL `LIKE` matching: `%` matches any run of characters, `_` exactly one.
///
/// Comparison ignores ASCII case.
pub fn like_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();

    // matched[j] == true when pattern[..i] matches text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;

    for p in &pattern {
        let mut next = vec![false; text.len() + 1];
        match p {
            '%' => {
                let mut seen = false;
                for j in 0..=text.len() {
                    seen = seen || matched[j];
                    next[j] = seen;
                }
            }
            '_' => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1];
                }
            }
            c => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1] && text[j - 1] == *c;
                }
            }
        }
        matched = next;
    }

    matched[text.len()]
}

/// Lower-cased runs of letters and digits.
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

/// Words of a match term, each flagged when it matches as a prefix.
fn term_words(term: &str) -> Vec<(String, bool)> {
    term.split_whitespace()
        .flat_map(|token| {
            let prefix = token.ends_with('*');
            let parts: Vec<String> = words(token).collect();
            let last = parts.len().saturating_sub(1);
            parts.into_iter().enumerate().map(move |(i, word)| (word, prefix && i == last))
        })
        .collect()
}

/// Full-text matching: every word of `term` must appear among the words
/// of `text`. A term word ending in `*` matches as a prefix.
pub fn text_matches(term: &str, text: &str) -> bool {
    let text_words: Vec<String> = words(text).collect();
    term_words(term).iter().all(|(wanted, prefix)| {
        text_words
            .iter()
            .any(|word| if *prefix { word.starts_with(wanted.as_str()) } else { word == wanted })
    })
}
