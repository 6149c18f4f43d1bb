use clap::{Parser, Subcommand};
use quire_config::Settings;
use quire_library::Library;
use quire_remote::{BookRecord, Database, SqliteStore, StaticIdentity, UserId};
use quire_storage::FsStore;
use std::error::Error;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Personal e-book library: book files on this device, the shelf shared
/// between all of them.
#[derive(Parser)]
#[command(name = "quire", version)]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug); overrides QUIRE_LOG
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import EPUB files onto the shelf
    Add {
        /// Paths of the .epub files to import
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show the shelf, newest first
    List,
    /// Save a reading position for a book
    Progress {
        /// Record id, as shown by `quire list`
        id: String,
        /// Reader locator for the position, e.g. an EPUB CFI
        locator: String,
        /// How far through the book, 0 to 100
        percent: f64,
    },
    /// Mark a book as a favorite
    Favorite {
        /// Record id, as shown by `quire list`
        id: String,
        /// Clear the mark instead of setting it
        #[arg(long)]
        off: bool,
    },
    /// Take a book off the shelf and delete its file
    Remove {
        /// Record id, as shown by `quire list`
        id: String,
    },
    /// Delete book files the shelf no longer points at
    Gc,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?;
    let (library, database) = open_library(&settings).await?;
    let outcome = dispatch(&library, cli.command).await;
    database.close().await;
    outcome
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => tracing_subscriber::EnvFilter::try_from_env("QUIRE_LOG")
            .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        1 => tracing_subscriber::EnvFilter::new("info"),
        _ => tracing_subscriber::EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn open_library(settings: &Settings) -> Result<(Library, Database), Box<dyn Error>> {
    std::fs::create_dir_all(&settings.data_dir)?;
    // The blob store wants an absolute root; the configured one may be
    // relative to wherever quire was launched from.
    let data_dir = settings.data_dir.canonicalize()?;
    let database = Database::connect(settings.database_path()).await?;
    let identity = match settings.user_id() {
        Some(user) => StaticIdentity::signed_in(UserId::new(user)),
        None => StaticIdentity::signed_out(),
    };
    let library = Library::new(
        Arc::new(FsStore::new(data_dir)?),
        Arc::new(SqliteStore::from(&database)),
        Arc::new(identity),
    );
    Ok((library, database))
}

async fn dispatch(library: &Library, command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Add { files } => {
            let mut failures = 0usize;
            for file in &files {
                match add_one(library, file).await {
                    Ok(record) => {
                        println!("added \"{}\" by {} ({})", record.title, record.author, record.id);
                    },
                    Err(err) => {
                        failures += 1;
                        eprintln!("{}: {err}", file.display());
                    },
                }
            }
            if failures > 0 {
                return Err(format!("{failures} of {} imports failed", files.len()).into());
            }
        },
        Command::List => {
            let books = library.books().await?;
            if books.is_empty() {
                println!("the shelf is empty");
            }
            for book in books {
                let marker = if book.is_favorite { '*' } else { ' ' };
                println!(
                    "{} {} {:>5.1}%  {} by {}",
                    book.id, marker, book.progress_percent, book.title, book.author
                );
            }
        },
        Command::Progress { id, locator, percent } => {
            library.update_progress(&id, &locator, percent).await?;
            println!("saved position for {id}");
        },
        Command::Favorite { id, off } => {
            library.set_favorite(&id, !off).await?;
            println!("{} {id}", if off { "unfavorited" } else { "favorited" });
        },
        Command::Remove { id } => {
            let books = library.books().await?;
            let Some(record) = books.iter().find(|book| book.id == id) else {
                return Err(format!("no book with id {id} on the shelf").into());
            };
            library.remove(record).await?;
            println!("removed \"{}\"", record.title);
        },
        Command::Gc => {
            let reclaimed = library.reclaim_orphans().await?;
            match reclaimed.len() {
                0 => println!("nothing to reclaim"),
                count => println!("reclaimed {count} orphaned book file(s)"),
            }
        },
    }
    Ok(())
}

async fn add_one(library: &Library, file: &Path) -> Result<BookRecord, Box<dyn Error>> {
    if !is_epub(file) {
        return Err("not an EPUB file".into());
    }
    let name = file.file_name().and_then(OsStr::to_str).unwrap_or("book.epub");
    let content = std::fs::read(file)?;
    Ok(library.add_book(name, content).await?)
}

/// Imports are gated on the exact `.epub` extension before any bytes are
/// read. Case matters: readers and stores expect the canonical spelling.
fn is_epub(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "epub")
}
