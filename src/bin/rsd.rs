//! `rsd` command-line tool: load a document, resolve it, and print it back
//! out or look up one reference inside it.
//!
//! Grounded on the teacher's own `cli` feature (`src/cli.rs`'s
//! `Cli`/`Commands` derive shape and a `run_cli() -> Result<(), Box<dyn
//! Error>>` entry point) and `src/main.rs`'s "print the error, exit 1" main.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use rsd::{Document, RsdError};

#[derive(Parser)]
#[command(name = "rsd")]
#[command(about = "Scene-description configuration language tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a document and print it back in canonical form.
    Print {
        /// Path to the .rsd file.
        path: PathBuf,
        /// Inline included files rather than leaving `include "path";`.
        #[arg(long)]
        follow_includes: bool,
        /// Render blocks as `{ k = v; }` instead of one member per line.
        #[arg(long)]
        inline: bool,
    },
    /// Parse a document and print the fully resolved value found at
    /// `reference` (e.g. `a.b[0].c`).
    Get {
        /// Path to the .rsd file.
        path: PathBuf,
        /// Reference expression to look up.
        reference: String,
        /// Fall back to the process environment on an unresolved reference.
        #[arg(long)]
        env: bool,
    },
    /// Parse a document (following includes) and report success or the
    /// first error encountered.
    Check {
        /// Path to the .rsd file.
        path: PathBuf,
    },
}

fn main() {
    env_logger::init();
    if let Err(e) = run_cli() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Print { path, follow_includes, inline } => cmd_print(&path, follow_includes, inline),
        Commands::Get { path, reference, env } => cmd_get(&path, &reference, env),
        Commands::Check { path } => cmd_check(&path),
    }
}

fn cmd_print(path: &PathBuf, follow_includes: bool, inline: bool) -> Result<(), Box<dyn Error>> {
    let doc = Document::load(path, follow_includes)?;
    println!("{}", doc.root().to_rsd_string(follow_includes, inline, 0));
    Ok(())
}

fn cmd_get(path: &PathBuf, reference: &str, env: bool) -> Result<(), Box<dyn Error>> {
    let doc = Document::load(path, true)?;
    let doc = if env { doc.with_process_environment() } else { doc };
    match doc.root().find_str(reference)? {
        Some(found) => {
            let (resolved, ok) = found.resolve()?;
            if !ok {
                log::warn!("'{reference}' resolved only partially");
            }
            println!("{}", resolved.to_rsd_string(false, true, 0));
            Ok(())
        }
        None => Err(Box::new(RsdError::value(format!("no such reference '{reference}'")))),
    }
}

fn cmd_check(path: &PathBuf) -> Result<(), Box<dyn Error>> {
    Document::load(path, true)?;
    println!("ok");
    Ok(())
}
