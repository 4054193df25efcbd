use std::process;
use std::thread;

use tracing_subscriber::{fmt, EnvFilter};

/// Deep but in-limit documents recurse once per nesting level in the parser,
/// decoder, validator and unparser.
const CLI_STACK_SIZE: usize = 64 * 1024 * 1024;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let worker = thread::Builder::new()
        .name("pyast-json".into())
        .stack_size(CLI_STACK_SIZE)
        .spawn(pyast_json::cli::run);
    let code = match worker {
        Ok(handle) => handle.join().unwrap_or(101),
        Err(e) => {
            eprintln!("Error: cannot start worker thread: {e}");
            1
        }
    };
    process::exit(code);
}
