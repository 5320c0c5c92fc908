//! Schema inspection and validation CLI for recordhub.
//!
//! recordhub's KV substrate is in-memory only (no on-disk format), so
//! there is nothing for a tool to migrate or inspect offline. What's
//! left to do ahead of deployment is schema authoring: this CLI lets
//! an operator describe the built-in auth schema, list the system
//! fields every collection gets for free, and validate a candidate
//! schema plus a sample record before wiring it into a running server.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use recordhub_schema::field::system_fields;
use recordhub_schema::{FieldDef, Schema};
use serde_json::Value;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the schema auto-materialized for the auth collection.
    DescribeAuth,

    /// Print the three system fields every schema gets for free.
    SystemFields,

    /// Validate a sample record against a field-definition file.
    ///
    /// The file holds a JSON object `{"fields": [...], "record": {...}}`
    /// where `fields` is an array of field definitions in the same shape
    /// `FieldDef` serializes to, and `record` is the candidate payload.
    ValidateSchema {
        /// Path to the schema + sample record JSON file.
        file: PathBuf,
    },
}

#[derive(serde::Deserialize)]
struct ValidateInput {
    fields: Vec<FieldDef>,
    record: serde_json::Map<String, Value>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::DescribeAuth => {
            let schema = Schema::auth_collection_default();
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Commands::SystemFields => {
            println!("{}", serde_json::to_string_pretty(&system_fields())?);
        }
        Commands::ValidateSchema { file } => {
            let raw = fs::read_to_string(&file)?;
            let input: ValidateInput = serde_json::from_str(&raw)?;
            let schema = Schema::new(input.fields);
            let issues = schema.validate(&input.record);
            if issues.is_empty() {
                println!("record is valid against the given schema");
            } else {
                println!("{} issue(s) found:", issues.len());
                for issue in &issues {
                    println!("  {}: {}", issue.field, issue.message);
                }
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
