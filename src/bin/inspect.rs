//! Schema inspection CLI
//!
//! Loads a schema document, lists its `$defs` entries, and reports
//! reference cycles among them.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use treeschema::SchemaDoc;

#[derive(Parser)]
#[command(name = "inspect")]
#[command(about = "Inspect a schema document's definitions and references")]
struct Cli {
    /// Path to the schema document (JSON)
    schema: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(2);
    }
}

fn run(cli: Cli) -> treeschema::Result<()> {
    let schema = SchemaDoc::from_path(&cli.schema)?;

    let defs = schema.def_names();
    if defs.is_empty() {
        println!("No $defs entries");
    } else {
        println!("$defs ({}):", defs.len());
        for name in &defs {
            println!("  - {}", name);
        }
    }

    let cycles = schema.ref_cycles();
    if cycles.is_empty() {
        println!("✅ No reference cycles");
    } else {
        println!("Reference cycles ({}):", cycles.len());
        for group in &cycles {
            println!("  ↻ {}", group.join(" -> "));
        }
    }

    Ok(())
}
