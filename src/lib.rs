/*!
# Spreadsheet Keyword Search

A dashboard service that keeps uploaded spreadsheets and searches their rows
for comma-separated keywords, built in Rust.

## Overview

An operator uploads spreadsheet files; the first sheet of each is flattened
to a tab/newline table and kept in a small persisted store. Any visitor can
then search all stored tables at once: every row containing at least one
keyword is returned with the keyword occurrences marked, a per-keyword count
and a serial number that runs across all files of that search. Results can be
downloaded as an XLSX workbook.

## Architecture

### Core
- **Table** - header + rows parsed from the stored table text
- **Matcher** - case-insensitive substring search of every keyword in every cell
- **Search** - runs the matcher over all stored files and numbers the matches
- **Store** - uploaded files keyed by name, in upload order

### Collaborators
- **Extract** - first sheet of `.xlsx/.xls/.xlsb/.ods` (calamine) or `.csv`
- **Upload** - concurrent extraction of a batch, ordered store update
- **Saving** - JSON store slot on disk, gzip + bincode snapshots
- **Downloader** - export sheets, XLSX and CSV output
- **Render** - HTML with `<mark>` highlights

### Web Layer (feature `web`)
- **App** - axum routes for files, search, export and snapshots
- **Admin** - argon2-checked operator login guarding uploads and deletes

## REST API Endpoints

- `GET /api/files` - Lists stored files
- `POST /api/files` - Uploads a batch (admin)
- `DELETE /api/files/{name}` - Deletes a stored file (admin)
- `GET /api/search?q=` - Runs a search
- `GET /api/export?q=` - Downloads the results as XLSX
- `GET|POST /api/snapshot` - Backs up / restores the whole store (admin)
*/

pub mod config;
pub mod downloader;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod render;
pub mod saving;
pub mod search;
pub mod store;
pub mod table;
pub mod upload;

#[cfg(feature = "web")]
pub mod admin;
#[cfg(feature = "web")]
pub mod app;

pub use error::{Error, Result};
pub use matcher::{AnnotatedCell, RowMatch, SearchTerm, Span, TermCounts, normalize_query};
pub use search::{FileResult, SearchOutcome, search};
pub use store::{FileStore, StoredFile};
