use clap::Parser;
use pagewatch::cli::{Cli, Command};
use pagewatch::config::Config;
use pagewatch::store::{Entry, UrlStore};
use pagewatch::sweep::{self, SweepError};

fn print_entries(entries: &[Entry]) {
    println!("ID\tURL\tModified\tEtag");
    for entry in entries {
        let modified = if entry.modified == 0 {
            "-".to_string()
        } else {
            chrono::DateTime::from_timestamp(entry.modified, 0)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "unknown".to_string())
        };
        println!("{}\t{}\t{}\t{:?}", entry.id, entry.url, modified, entry.etag);
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::resolve(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let store = match UrlStore::open(&config.db_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        None => match sweep::run(&config, &store) {
            Ok(summary) => {
                println!(
                    "Completed. {} checked: {} changed, {} unchanged, {} without freshness signal, {} failed.",
                    summary.checked,
                    summary.changed,
                    summary.unchanged,
                    summary.no_signal,
                    summary.failed
                );
            }
            Err(SweepError::NoEntries) => {
                eprintln!("No entries tracked. Add one with `pagewatch add <url>`.");
                std::process::exit(2);
            }
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        Some(Command::Add(args)) => match store.insert(&args.url) {
            Ok(id) => println!("Added: {} (id:{id})", args.url),
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        Some(Command::Delete(args)) => match store.delete(args.id) {
            Ok(true) => println!("Deleted: {}", args.id),
            Ok(false) => {
                eprintln!("No entry with id {}", args.id);
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        Some(Command::List(args)) => match store.list() {
            Ok(entries) => {
                if args.json {
                    match serde_json::to_string_pretty(&entries) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("error: {e}");
                            std::process::exit(1);
                        }
                    }
                } else {
                    print_entries(&entries);
                }
            }
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
    }
}
