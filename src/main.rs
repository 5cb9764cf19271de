//! artifactfinder: find the Maven artifact that provides a class or function
//!
//! Usage:
//!   artifactfinder serve [--port 8080]     Start the HTTP search and MCP server
//!   artifactfinder mcp                     Start the MCP server (stdio transport)
//!   artifactfinder search <query>          Search the index
//!   artifactfinder status                  Show index statistics
//!   artifactfinder add <g:a:v> [--google]  Queue an artifact for fetching
//!   artifactfinder check-spec <file>       Validate an external source document

mod server;

use std::env;
use std::path::Path;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use artifactfinder::cli::{
    add_command, check_spec_command, search_command, status_command, with_db_override,
};
use artifactfinder::FinderConfig;

const DEFAULT_PORT: u16 = 8080;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    setup_logging();

    let db = flag_value(&args, "--db");
    let config = with_db_override(FinderConfig::from_env()?, db);
    // positional arguments after the command, with flags and their values removed
    let positional = positional_args(&args[2..]);

    match args[1].as_str() {
        "serve" => {
            let port = flag_value(&args, "--port")
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT);
            server::start_http(port, config)?;
        }
        "mcp" => {
            server::start_stdio(config)?;
        }
        "search" => {
            let Some(query) = positional.first() else {
                eprintln!("Usage: artifactfinder search <query> [--methods]");
                return Ok(());
            };
            let methods = args.iter().any(|a| a == "--methods");
            search_command(&config, query, methods)?;
        }
        "status" => {
            status_command(&config)?;
        }
        "add" => {
            let Some(coordinates) = positional.first() else {
                eprintln!("Usage: artifactfinder add <group:artifact:version> [--google]");
                return Ok(());
            };
            let google = args.iter().any(|a| a == "--google");
            add_command(&config, coordinates, google)?;
        }
        "check-spec" => {
            let Some(path) = positional.first() else {
                eprintln!("Usage: artifactfinder check-spec <file>");
                return Ok(());
            };
            check_spec_command(Path::new(path))?;
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        "--version" | "-V" | "version" => {
            print_version();
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
        }
    }

    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn positional_args(args: &[String]) -> Vec<&str> {
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--db" | "--port" => {
                iter.next();
            }
            a if a.starts_with("--") => {}
            a => positional.push(a),
        }
    }
    positional
}

fn print_usage() {
    println!(
        r#"artifactfinder: find the Maven artifact that provides a class or function

USAGE:
    artifactfinder <COMMAND> [OPTIONS]

COMMANDS:
    serve [--port <PORT>]          Serve GET /search and MCP under /mcp (default port 8080)
    mcp                            Start the MCP server (stdio transport)
    search <query> [--methods]     Search classes, and functions with --methods
    status                         Show index statistics
    add <g:a:v> [--google]         Queue an artifact version (Maven Central unless --google)
    check-spec <file>              Validate an external source document
    help                           Show this help message

OPTIONS:
    --db <path>                    Index file (default: .artifactfinder/index.db)

ENVIRONMENT:
    ARTIFACTFINDER_DB              Index file
    ARTIFACTFINDER_IN_MEMORY=1     Use an in-memory index
    ARTIFACTFINDER_POOL_LIMIT      Pooled connections (default: 4)
    ARTIFACTFINDER_WORKERS         Concurrent crawl jobs (default: 5)
    RUST_LOG                       Log filter (default: info)

EXAMPLES:
    artifactfinder add androidx.core:core-ktx:1.3.0 --google
    artifactfinder search RecyclerView
    artifactfinder search isVisible --methods
    artifactfinder serve --port 9000
"#
    );
}

fn print_version() {
    println!("artifactfinder {}", env!("CARGO_PKG_VERSION"));
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}
