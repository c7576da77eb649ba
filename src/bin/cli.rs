#![cfg(not(tarpaulin_include))]

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use sheet_search::config::Config;
use sheet_search::downloader::{export_sheets, to_csv, to_xlsx};
use sheet_search::saving::{load_store, save_store};
use sheet_search::search::search;
use sheet_search::upload::{UploadedFile, ingest_batch};

#[derive(Parser)]
#[command(name = "cli", about = "Search keywords across stored spreadsheets")]
struct Cli {
    /// Store slot to use (defaults to `$SEARCH_DATA_DIR/store.json`)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read spreadsheet files into the store, replacing files of the same name
    Upload { files: Vec<PathBuf> },
    /// Remove a stored file by name
    Delete { name: String },
    /// Show stored files
    List,
    /// Search stored files for comma-separated keywords
    Search {
        query: String,
        /// Write the results to an XLSX workbook
        #[arg(long)]
        xlsx: Option<PathBuf>,
        /// Print the results as CSV instead of a table
        #[arg(long)]
        csv: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store_path = cli.store.unwrap_or_else(|| Config::from_env().store_path());
    let mut store = load_store(&store_path);

    match cli.command {
        Command::Upload { files } => {
            let mut batch = Vec::with_capacity(files.len());
            for path in &files {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                batch.push(UploadedFile::new(name, fs::read(path)?));
            }

            for status in ingest_batch(&mut store, batch).await {
                match status.message {
                    None => println!("Upload successful: {}", status.file_name),
                    Some(msg) => println!("Upload failed: {} ({})", status.file_name, msg),
                }
            }
            save_store(&store, &store_path)?;
        }
        Command::Delete { name } => {
            if store.delete(&name) {
                save_store(&store, &store_path)?;
                println!("Deleted {}", name);
            } else {
                return Err(format!("No file named '{}'", name).into());
            }
        }
        Command::List => {
            if store.is_empty() {
                println!("No files uploaded yet.");
            }
            for file in store.list() {
                println!(
                    "{}\t{} rows\t{}",
                    file.name,
                    file.row_count(),
                    file.uploaded_at.to_rfc3339()
                );
            }
        }
        Command::Search { query, xlsx, csv } => {
            let outcome = search(store.list(), &query);
            let sheets = export_sheets(&outcome);

            if csv {
                for sheet in &sheets {
                    println!("# {} ({})", sheet.name, sheet.source_file);
                    print!("{}", to_csv(sheet));
                }
            } else {
                for result in &outcome.results {
                    println!("File: {} ({} matches)", result.file_name, result.matches.len());
                    for m in &result.matches {
                        let cells: Vec<&str> = m.cells.iter().map(|c| c.text.as_str()).collect();
                        println!("  {:>4}  row {:<5} {}", m.serial_number, m.row_index, cells.join(" | "));
                    }
                }
            }

            let counts: Vec<String> = outcome
                .term_counts
                .iter()
                .map(|(term, n)| format!("{}: {}", term, n))
                .collect();
            println!("Total Matches: {}", outcome.total_matches);
            if !counts.is_empty() {
                println!("Matches per keyword: {}", counts.join(", "));
            }

            if let Some(path) = xlsx {
                match to_xlsx(&sheets)? {
                    Some(buffer) => {
                        fs::write(&path, buffer)?;
                        println!("Exported to {}", path.display());
                    }
                    None => println!("No results to export."),
                }
            }
        }
    }

    Ok(())
}
