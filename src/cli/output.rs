//! User-facing output for the CLI.
//!
//! Results go to stdout, diagnostics and warnings to stderr. Colour is applied
//! through `termcolor` and dropped automatically when the stream is not a
//! terminal.

use std::io::{IsTerminal, Write};

use difference::{Changeset, Difference};
use miette::Report;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::codec::DecodeWarning;
use crate::validation::ValidationReport;
use crate::AstJsonError;

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Renders an error as a miette report on stderr.
pub fn print_error(error: AstJsonError) {
    let report = Report::new(error);
    eprintln!("{report:?}");
}

pub fn print_warnings(warnings: &[DecodeWarning]) {
    if warnings.is_empty() {
        return;
    }
    let mut stderr = StandardStream::stderr(color_choice(std::io::stderr().is_terminal()));
    for warning in warnings {
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = write!(stderr, "warning");
        let _ = stderr.reset();
        let _ = writeln!(stderr, ": {warning}");
    }
}

pub fn print_validation(report: &ValidationReport) {
    let mut stdout = StandardStream::stdout(color_choice(std::io::stdout().is_terminal()));
    if report.valid {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
        let _ = write!(stdout, "valid");
        let _ = stdout.reset();
        match report.compile_mode {
            Some(mode) => {
                let _ = writeln!(stdout, " ({} mode)", mode.as_str());
            }
            None => {
                let _ = writeln!(stdout);
            }
        }
    } else {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = writeln!(stdout, "invalid");
        let _ = stdout.reset();
        print_section(&mut stdout, "schema", &report.schema_errors);
        print_section(&mut stdout, "semantic", &report.semantic_errors);
    }
    print_warnings(&report.warnings);
}

/// Prints a line diff between the original and regenerated source.
pub fn print_roundtrip(original: &str, regenerated: &str, structurally_equal: bool) {
    let mut stdout = StandardStream::stdout(color_choice(std::io::stdout().is_terminal()));
    let changeset = Changeset::new(original.trim_end(), regenerated.trim_end(), "\n");
    print_diff(&mut stdout, &changeset.diffs);
    let _ = writeln!(stdout);
    let (color, verdict) = if structurally_equal {
        (Color::Green, "syntax trees match")
    } else {
        (Color::Red, "syntax trees differ")
    };
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = writeln!(stdout, "{verdict}");
    let _ = stdout.reset();
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

/// Piped output stays plain.
fn color_choice(is_terminal: bool) -> ColorChoice {
    if is_terminal {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

fn print_section(stdout: &mut StandardStream, label: &str, errors: &[String]) {
    for error in errors {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
        let _ = write!(stdout, "  {label}: ");
        let _ = stdout.reset();
        let _ = writeln!(stdout, "{error}");
    }
}

fn print_diff(stdout: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        match diff {
            Difference::Same(ref x) => {
                let _ = stdout.reset();
                for line in x.lines() {
                    let _ = writeln!(stdout, " {line}");
                }
            }
            Difference::Add(ref x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                for line in x.lines() {
                    let _ = writeln!(stdout, "+{line}");
                }
            }
            Difference::Rem(ref x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
                for line in x.lines() {
                    let _ = writeln!(stdout, "-{line}");
                }
            }
        }
    }
    let _ = stdout.reset();
}
