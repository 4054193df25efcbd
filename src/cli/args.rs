//! Command-line arguments and subcommands for the pyast-json CLI.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::PythonVersion;
use crate::tool::SourceType;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "pyast-json",
    version,
    about = "Convert Python source to JSON syntax trees, and back."
)]
pub struct AstJsonArgs {
    /// YAML configuration file overlaid on the defaults.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Python release to target, e.g. 3.9 or 3.12.1.
    #[arg(long, global = true, value_name = "VERSION")]
    pub target: Option<PythonVersion>,
    /// Print JSON on a single line.
    #[arg(long, global = true)]
    pub compact: bool,
    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse Python source and print its JSON document.
    ToJson {
        /// A file path, a dotted module name, or source text.
        source: String,
        #[arg(long, value_enum, default_value_t = SourceType::File)]
        source_type: SourceType,
        /// Leave node locations out of the document.
        #[arg(long)]
        no_locations: bool,
    },
    /// Regenerate Python source from a JSON document.
    FromJson {
        /// A JSON file, JSON text, or `-` for stdin.
        input: String,
    },
    /// Check a JSON document against the schema and the compiler rules.
    Validate {
        /// A JSON file, JSON text, or `-` for stdin.
        input: String,
        /// Schema file to use instead of the generated one.
        #[arg(long, value_name = "FILE")]
        schema: Option<PathBuf>,
    },
    /// Convert source to JSON and back, then diff the result.
    Roundtrip {
        source: String,
        #[arg(long, value_enum, default_value_t = SourceType::File)]
        source_type: SourceType,
    },
    /// Print the generated JSON Schema.
    Schema,
    /// Run a JSON tool request, e.g. `{"action": "validate", "json_data": ...}`.
    Execute {
        /// The request as JSON text; read from stdin when omitted.
        request: Option<String>,
    },
}
