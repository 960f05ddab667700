//! Diagnostic CLI: issue one resilient call to a configured destination.
//!
//! Destinations are read from the environment (`<NAME>_SERVICE_URL` and friends),
//! exactly as an application embedding the library would configure them.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use service_link::observability::logging::{init_logging, LogFormat};
use service_link::{ClientRegistry, RequestContext, ServiceError};

#[derive(Parser)]
#[command(name = "service-link")]
#[command(about = "Call a downstream service through the resilience pipeline", long_about = None)]
struct Cli {
    /// Destination name, e.g. "student-service" (reads STUDENT_SERVICE_URL).
    destination: String,

    /// Bearer token sent as `Authorization: Bearer <token>`.
    #[arg(short, long, env = "SERVICE_LINK_TOKEN")]
    token: Option<String>,

    /// Trace ID to propagate; a UUID v4 is generated when omitted.
    #[arg(long)]
    trace_id: Option<String>,

    /// Overall deadline for the call, across all attempts.
    #[arg(long)]
    deadline_ms: Option<u64>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GET a resource
    Get { path: String },
    /// DELETE a resource
    Delete { path: String },
    /// POST a JSON body
    Post { path: String, body: String },
    /// PUT a JSON body
    Put { path: String, body: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_format, "service_link=info") {
        eprintln!("failed to initialize logging: {e}");
    }

    let registry = match ClientRegistry::from_env([cli.destination.as_str()]) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    let client = match registry.client_for(&cli.destination) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    let mut ctx = RequestContext::new();
    if let Some(trace_id) = cli.trace_id {
        ctx = ctx.with_trace_id(trace_id);
    }
    if let Some(token) = cli.token {
        ctx = ctx.with_auth_token(token);
    }
    if let Some(ms) = cli.deadline_ms {
        ctx = ctx.with_timeout(Duration::from_millis(ms));
    }

    let result: Result<Value, ServiceError> = match cli.command {
        Commands::Get { path } => client.get(&path, &ctx).await,
        Commands::Delete { path } => client.delete(&path, &ctx).await,
        Commands::Post { path, body } => match parse_body(&body) {
            Ok(body) => client.post(&path, &body, &ctx).await,
            Err(code) => return code,
        },
        Commands::Put { path, body } => match parse_body(&body) {
            Ok(body) => client.put(&path, &body, &ctx).await,
            Err(code) => return code,
        },
    };

    match result {
        Ok(value) => {
            println!("{}", to_pretty(&value));
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{}", to_pretty(&err.to_json()));
            ExitCode::FAILURE
        }
    }
}

fn parse_body(raw: &str) -> Result<Value, ExitCode> {
    serde_json::from_str(raw).map_err(|e| {
        eprintln!("Error: request body is not valid JSON: {e}");
        ExitCode::from(2)
    })
}

fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
