use serde::Serialize;

use crate::matcher::{Matcher, RowMatch, TermCounts, normalize_query};
use crate::store::StoredFile;
use crate::table::Table;

/// Matching rows of one stored file
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileResult {
    pub file_name: String,
    pub headers: Vec<String>,
    pub matches: Vec<RowMatch>,
}

/// Everything one search invocation produced
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<FileResult>,
    pub total_matches: usize,
    pub term_counts: TermCounts,
    pub searched_files: usize,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

// Running state of the fold over stored files
struct Accumulator {
    results: Vec<FileResult>,
    term_counts: TermCounts,
    next_serial: usize,
    searched_files: usize,
}

/// Search every stored file for the comma-separated keywords in `query`.
///
/// Files are visited in store order and rows in table order. Serial numbers
/// start at 1 and continue across files, so the whole outcome carries one
/// contiguous run. Files without data rows or without matches are left out.
///
/// # Examples
/// ```
/// use sheet_search::search::search;
/// use sheet_search::store::StoredFile;
///
/// let files = vec![StoredFile::new("sales.csv", "Region\tAmount\nEast\t100\nWest\t200\nEast\t300")];
/// let outcome = search(&files, "east");
/// assert_eq!(outcome.total_matches, 2);
/// assert_eq!(outcome.term_counts.get("east"), Some(2));
/// ```
pub fn search(files: &[StoredFile], query: &str) -> SearchOutcome {
    let terms = normalize_query(query);
    if terms.is_empty() || files.is_empty() {
        log::debug!("empty search: {} terms, {} files", terms.len(), files.len());
        return SearchOutcome::default();
    }

    let matcher = Matcher::new(&terms);
    let start = Accumulator {
        results: Vec::new(),
        term_counts: TermCounts::for_terms(&terms),
        next_serial: 1,
        searched_files: 0,
    };

    let done = files.iter().fold(start, |acc, file| fold_file(acc, &matcher, file));
    let total_matches = done.next_serial - 1;

    log::info!(
        "search {:?}: {} matches in {} of {} files",
        query.trim(),
        total_matches,
        done.results.len(),
        done.searched_files
    );

    SearchOutcome {
        results: done.results,
        total_matches,
        term_counts: done.term_counts,
        searched_files: done.searched_files,
    }
}

fn fold_file(mut acc: Accumulator, matcher: &Matcher, file: &StoredFile) -> Accumulator {
    let table = Table::parse(&file.raw_table);
    if !table.has_data_rows() {
        return acc;
    }
    acc.searched_files += 1;

    let found = matcher.match_table(&table);
    acc.term_counts.merge(&found.term_counts);
    if found.rows.is_empty() {
        return acc;
    }

    let mut matches = found.rows;
    for row in matches.iter_mut() {
        row.serial_number = acc.next_serial;
        acc.next_serial += 1;
    }

    acc.results.push(FileResult {
        file_name: file.name.clone(),
        headers: table.header,
        matches,
    });
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> StoredFile {
        StoredFile::new("sales.csv", "Region\tAmount\nEast\t100\nWest\t200\nEast\t300")
    }

    #[test]
    fn sales_example() {
        let outcome = search(&[sales()], "east");

        assert_eq!(outcome.total_matches, 2);
        assert_eq!(outcome.results.len(), 1);
        let file = &outcome.results[0];
        assert_eq!(file.file_name, "sales.csv");
        assert_eq!(file.headers, vec!["Region", "Amount"]);

        let serials: Vec<usize> = file.matches.iter().map(|m| m.serial_number).collect();
        assert_eq!(serials, vec![1, 2]);
        let rows: Vec<usize> = file.matches.iter().map(|m| m.row_index).collect();
        assert_eq!(rows, vec![1, 3]);
        assert_eq!(outcome.term_counts.get("east"), Some(2));
    }

    #[test]
    fn blank_query_yields_nothing() {
        for query in ["", "   ", " , ,"] {
            let outcome = search(&[sales()], query);
            assert!(outcome.is_empty());
            assert_eq!(outcome.total_matches, 0);
            assert!(outcome.term_counts.is_empty());
        }
    }

    #[test]
    fn empty_store_yields_nothing() {
        let outcome = search(&[], "east");
        assert_eq!(outcome, SearchOutcome::default());
    }

    #[test]
    fn serials_continue_across_files() {
        let files = vec![
            StoredFile::new("a", "H\nk1\nx\nk2"),
            StoredFile::new("b", "H\nnothing"),
            StoredFile::new("c", "H\nk3\nk4"),
        ];
        let outcome = search(&files, "k");

        let names: Vec<&str> = outcome.results.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);

        let serials: Vec<usize> = outcome
            .results
            .iter()
            .flat_map(|r| r.matches.iter().map(|m| m.serial_number))
            .collect();
        assert_eq!(serials, vec![1, 2, 3, 4]);
        assert_eq!(outcome.total_matches, 4);
        assert_eq!(outcome.searched_files, 3);
    }

    #[test]
    fn header_only_files_are_skipped() {
        let files = vec![
            StoredFile::new("empty", ""),
            StoredFile::new("header", "east\twest"),
            sales(),
        ];
        let outcome = search(&files, "east");
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].matches[0].serial_number, 1);
        assert_eq!(outcome.searched_files, 1);
    }

    #[test]
    fn counts_sum_across_files() {
        let files = vec![sales(), StoredFile::new("more", "R\neast east")];
        let outcome = search(&files, "east, west");
        assert_eq!(outcome.term_counts.get("east"), Some(4));
        assert_eq!(outcome.term_counts.get("west"), Some(1));
    }

    #[test]
    fn repeated_searches_are_identical() {
        let files = vec![sales(), StoredFile::new("b", "X\tY\nwest\teast")];
        let first = serde_json::to_string(&search(&files, "east,west")).unwrap();
        let second = serde_json::to_string(&search(&files, "east,west")).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("\"serial_number\":1"));
    }
}
