use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "mock-cli")]
#[command(about = "Management CLI for the route mock server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key, if the server requires one
    #[arg(short, long, env = "MOCK_ADMIN_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server status and table version
    Status,
    /// Inspect or replace the route table
    Routes {
        #[command(subcommand)]
        command: RoutesCommand,
    },
    /// Inspect or reload response templates
    Templates {
        #[command(subcommand)]
        command: TemplatesCommand,
    },
    /// Request a bearer token for `sub`
    Token { sub: String },
}

#[derive(Subcommand)]
enum RoutesCommand {
    /// Print the active route definitions
    Get,
    /// Replace the route table with a JSON file
    Put { file: PathBuf },
}

#[derive(Subcommand)]
enum TemplatesCommand {
    /// List loaded and failed templates
    List,
    /// Rescan the template root
    Reload,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    }

    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")),
        Commands::Routes { command: RoutesCommand::Get } => client.get(format!("{base}/api/routes")),
        Commands::Routes {
            command: RoutesCommand::Put { file },
        } => {
            let body = tokio::fs::read(&file).await?;
            // Fail locally on malformed JSON instead of round-tripping it.
            serde_json::from_slice::<Value>(&body)?;
            client
                .put(format!("{base}/api/routes"))
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
        }
        Commands::Templates {
            command: TemplatesCommand::List,
        } => client.get(format!("{base}/api/templates")),
        Commands::Templates {
            command: TemplatesCommand::Reload,
        } => client.post(format!("{base}/api/templates/reload")),
        Commands::Token { sub } => client
            .post(format!("{base}/token"))
            .json(&serde_json::json!({ "sub": sub })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let pretty = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or(text);

    if !status.is_success() {
        eprintln!("Error: server returned status {status}");
        eprintln!("{pretty}");
        std::process::exit(1);
    }

    println!("{pretty}");
    Ok(())
}
