use regex::{Regex, RegexBuilder};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::table::Table;

/// Separator between keywords in a raw query
pub const TERM_SEPARATOR: char = ',';

// compiled size of one keyword pattern; the regex default is 10 MiB
const PATTERN_SIZE_LIMIT: usize = 256 * 1024 * 1024;

/// A normalized keyword, never empty
///
/// The lower-cased form keys the counts; the trimmed text as typed is what
/// gets matched, so a keyword always finds its own spelling in a cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchTerm {
    key: String,
    literal: String,
}

impl SearchTerm {
    pub fn new(raw: &str) -> Option<Self> {
        let literal = raw.trim();
        if literal.is_empty() {
            None
        } else {
            Some(SearchTerm {
                key: literal.to_lowercase(),
                literal: literal.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }
}

/// Split a raw query on commas and normalize each keyword.
///
/// Blank keywords are dropped and repeated keywords keep only their first
/// position, so `"east, , East"` yields a single term `east`.
pub fn normalize_query(query: &str) -> Vec<SearchTerm> {
    let mut terms: Vec<SearchTerm> = Vec::new();
    for term in query.split(TERM_SEPARATOR).filter_map(SearchTerm::new) {
        if !terms.iter().any(|t| t.key == term.key) {
            terms.push(term);
        }
    }
    terms
}

/// Byte range of one keyword occurrence inside a cell
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub term: String,
}

/// Cell text plus the places where keywords occur in it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedCell {
    pub text: String,
    pub spans: Vec<Span>,
}

impl AnnotatedCell {
    pub fn plain(text: &str) -> Self {
        AnnotatedCell {
            text: text.to_string(),
            spans: Vec::new(),
        }
    }

    pub fn is_highlighted(&self) -> bool {
        !self.spans.is_empty()
    }
}

/// One data row that contained at least one keyword
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMatch {
    /// Global number within one search, assigned by the aggregator
    pub serial_number: usize,
    /// 1-based position among the data rows (header excluded)
    pub row_index: usize,
    pub cells: Vec<AnnotatedCell>,
}

/// Occurrence counts per keyword, ordered as the keywords appear in the query
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TermCounts {
    entries: Vec<(String, usize)>,
}

impl TermCounts {
    /// Every term starts at zero so the order is fixed by the query.
    pub fn for_terms(terms: &[SearchTerm]) -> Self {
        TermCounts {
            entries: terms.iter().map(|t| (t.as_str().to_string(), 0)).collect(),
        }
    }

    pub fn add(&mut self, term: &str, count: usize) {
        match self.entries.iter_mut().find(|(t, _)| t == term) {
            Some((_, n)) => *n += count,
            None => self.entries.push((term.to_string(), count)),
        }
    }

    pub fn merge(&mut self, other: &TermCounts) {
        for (term, count) in &other.entries {
            self.add(term, *count);
        }
    }

    pub fn get(&self, term: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(t, _)| t == term)
            .map(|(_, n)| *n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(t, n)| (t.as_str(), *n))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Serialize for TermCounts {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (term, count) in &self.entries {
            map.serialize_entry(term, count)?;
        }
        map.end()
    }
}

/// Matches of one table: the matching rows in table order plus counts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableMatch {
    pub rows: Vec<RowMatch>,
    pub term_counts: TermCounts,
}

struct TermPattern {
    term: String,
    regex: Regex,
}

/// Compiled keyword set, reusable across tables
pub struct Matcher {
    terms: Vec<SearchTerm>,
    patterns: Vec<TermPattern>,
}

impl Matcher {
    /// Keywords are matched literally and case-insensitively.
    pub fn new(terms: &[SearchTerm]) -> Self {
        let patterns = terms
            .iter()
            .filter_map(|term| {
                match RegexBuilder::new(&regex::escape(term.literal()))
                    .case_insensitive(true)
                    .size_limit(PATTERN_SIZE_LIMIT)
                    .build()
                {
                    Ok(regex) => Some(TermPattern {
                        term: term.as_str().to_string(),
                        regex,
                    }),
                    Err(e) => {
                        log::warn!("keyword '{}' cannot be searched: {}", term.as_str(), e);
                        None
                    }
                }
            })
            .collect();

        Matcher {
            terms: terms.to_vec(),
            patterns,
        }
    }

    pub fn terms(&self) -> &[SearchTerm] {
        &self.terms
    }

    /// Scan every data row of `table`.
    ///
    /// A row matches when any keyword occurs in any of its cells. Every
    /// non-overlapping occurrence of every keyword becomes a span and adds one
    /// to that keyword's count. Keywords are independent of each other, so
    /// `"ea"` and `"east"` both count inside `"East"`.
    pub fn match_table(&self, table: &Table) -> TableMatch {
        let mut term_counts = TermCounts::for_terms(&self.terms);
        let mut rows = Vec::new();

        if self.patterns.is_empty() {
            return TableMatch { rows, term_counts };
        }

        for (idx, row) in table.rows.iter().enumerate() {
            let mut matched = false;
            let cells: Vec<AnnotatedCell> = row
                .iter()
                .map(|text| {
                    let cell = self.annotate(text, &mut term_counts);
                    matched |= cell.is_highlighted();
                    cell
                })
                .collect();

            if matched {
                rows.push(RowMatch {
                    serial_number: 0,
                    row_index: idx + 1,
                    cells,
                });
            }
        }

        TableMatch { rows, term_counts }
    }

    fn annotate(&self, text: &str, counts: &mut TermCounts) -> AnnotatedCell {
        let mut spans = Vec::new();
        for pattern in &self.patterns {
            let before = spans.len();
            spans.extend(pattern.regex.find_iter(text).map(|m| Span {
                start: m.start(),
                end: m.end(),
                term: pattern.term.clone(),
            }));
            let found = spans.len() - before;
            if found > 0 {
                counts.add(&pattern.term, found);
            }
        }
        spans.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));

        AnnotatedCell {
            text: text.to_string(),
            spans,
        }
    }
}

/// One-shot form of [`Matcher::match_table`].
pub fn match_table(table: &Table, terms: &[SearchTerm]) -> TableMatch {
    Matcher::new(terms).match_table(table)
}
