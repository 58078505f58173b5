mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use mcp::ChannelOptions;
use runtime::{AnyToolHost, McpToolHost, Session, SseToolHost, Step};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::{Config, Transport};
use error::{Error, Result};

const CONFIG_FILE: &str = "sql-agent.toml";

#[derive(Parser)]
#[command(name = "sql-agent")]
#[command(about = "Chat with a SQLite database through an LLM agent", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file; defaults apply when it does not exist
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Base URL of the SSE tool server (overrides the config file)
    #[arg(long)]
    server_url: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "sql_agent=warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run().await {
        error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(url) = cli.server_url {
        config.server.url = url;
    }

    let backend = config.backend()?;
    info!(%backend, "backend ready");

    let host = connect_tools(&config).await?;
    let mut session = Session::new(backend, host)?.with_policy(config.agent);

    chat(&mut session).await
}

async fn connect_tools(config: &Config) -> Result<AnyToolHost> {
    let server = &config.server;
    match server.transport {
        Transport::Sse => {
            if !mcp::probe(&server.url, mcp::PROBE_TIMEOUT).await {
                return Err(Error::Connection {
                    url: server.url.clone(),
                });
            }
            let host = SseToolHost::connect(&server.url, ChannelOptions::default()).await?;
            info!(url = %server.url, "connected to tool server");
            Ok(host.into())
        }
        Transport::Stdio => {
            let host = McpToolHost::spawn(&server.stdio_server())
                .await
                .map_err(|e| Error::Spawn(e.to_string()))?;
            info!(command = %server.command, db = ?server.db, "spawned tool server");
            Ok(host.into())
        }
    }
}

async fn chat<B, H>(session: &mut Session<B, H>) -> Result<()>
where
    B: runtime::LlmBackend,
    H: runtime::ToolHost,
{
    println!("Interactive chat started. Type 'exit' to quit.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("You: ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            println!();
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") {
            println!("Goodbye!");
            break;
        }

        match session.process(input).await {
            Ok(result) => {
                print_steps(&result.steps);
                println!("Agent: {}", result.output);
            }
            Err(e) => {
                error!("turn failed: {e}");
                println!("Agent: Processing error: {e}");
            }
        }
    }

    Ok(())
}

fn print_steps(steps: &[Step]) {
    for step in steps {
        if !step.thought.is_empty() {
            println!("Thought: {}", step.thought);
        }
        match &step.action {
            Some(action) => {
                println!("Action: {action}");
                println!("Action Input: {}", step.action_input);
            }
            None => println!("Unparsed output: {}", step.log.trim()),
        }
        println!("Observation: {}", step.observation);
    }
}
