//! The pyast-json command-line interface.
//!
//! Every subcommand is a thin layer over [`PythonAstJsonTool`]: arguments are
//! turned into a configured tool, the tool does the work, and [`output`]
//! renders the result. Failures are printed as miette reports and give exit
//! status 1.

use std::io::Read;

use clap::Parser;

use crate::cli::args::{AstJsonArgs, Command};
use crate::cli::output::{print_error, print_roundtrip, print_validation, print_warnings};
use crate::codec::{parse_json_text, render_json, JsonInput};
use crate::config::ToolConfig;
use crate::diagnostics::Result;
use crate::err_msg;
use crate::tool::{PythonAstJsonTool, SourceType};
use crate::validation::builtin_schema;

pub mod args;
pub mod output;

// ============================================================================
// MAIN ENTRY POINT
// ============================================================================

/// Parses the process arguments, runs the subcommand and returns the exit status.
pub fn run() -> i32 {
    run_with(AstJsonArgs::parse())
}

pub fn run_with(args: AstJsonArgs) -> i32 {
    match dispatch(args) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            print_error(e);
            1
        }
    }
}

/// `Ok(false)` means the command ran but its verdict is negative.
fn dispatch(args: AstJsonArgs) -> Result<bool> {
    let tool = PythonAstJsonTool::new(load_config(&args)?);
    let pretty = tool.config().format_output;
    match args.command {
        Command::ToJson {
            source,
            source_type,
            no_locations,
        } => {
            let document = tool.to_json(&source, source_type, no_locations.then_some(false))?;
            println!("{}", render_json(&document, pretty)?);
            Ok(true)
        }
        Command::FromJson { input } => {
            let output = tool.from_json(read_json_input(&input)?)?;
            print_warnings(&output.warnings);
            println!("{}", output.source_code);
            Ok(true)
        }
        Command::Validate { input, schema } => {
            let report = tool.validate(read_json_input(&input)?, schema.as_deref());
            print_validation(&report);
            Ok(report.valid)
        }
        Command::Roundtrip {
            source,
            source_type,
        } => roundtrip(&tool, &source, source_type),
        Command::Schema => {
            println!("{}", render_json(builtin_schema(), pretty)?);
            Ok(true)
        }
        Command::Execute { request } => {
            let text = match request {
                Some(text) => text,
                None => read_stdin()?,
            };
            let response = tool.execute_json(parse_json_text(&text)?);
            println!("{}", response.to_text()?);
            Ok(response.success)
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn load_config(args: &AstJsonArgs) -> Result<ToolConfig> {
    let mut config = match &args.config {
        Some(path) => ToolConfig::load(path)?,
        None => ToolConfig::default(),
    };
    if let Some(version) = args.target {
        config = config.with_target(version);
    }
    if args.compact {
        config.format_output = false;
    }
    Ok(config)
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| err_msg!(Input, "Cannot read standard input").caused_by(e))?;
    Ok(buffer)
}

fn read_json_input(input: &str) -> Result<JsonInput> {
    if input == "-" {
        return Ok(JsonInput::Value(parse_json_text(&read_stdin()?)?));
    }
    Ok(JsonInput::Text(input.to_string()))
}

/// Source to JSON to source, then compares the two syntax trees.
fn roundtrip(tool: &PythonAstJsonTool, source: &str, source_type: SourceType) -> Result<bool> {
    let acquired = tool.acquire(source, source_type)?;
    let original = tool.to_json(&acquired.text, SourceType::Code, Some(false))?;
    let regenerated = tool.from_json(original.clone())?;
    print_warnings(&regenerated.warnings);
    let reparsed = tool.to_json(&regenerated.source_code, SourceType::Code, Some(false))?;
    let equal = original["ast"] == reparsed["ast"];
    tracing::debug!(filename = acquired.filename(), equal, "roundtrip finished");
    print_roundtrip(&acquired.text, &regenerated.source_code, equal);
    Ok(equal)
}
