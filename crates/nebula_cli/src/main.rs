use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use colored::Colorize;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "nebula-cli")]
#[command(about = "CLI client for the nebula gateway")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "http://localhost:8000")]
    server_url: String,

    /// Continue an existing session
    #[arg(long)]
    session_id: Option<String>,

    /// API key for a gateway that requires one
    #[arg(long, env = "API_KEY")]
    api_key: Option<String>,

    /// Enable debug output
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive conversation
    Chat,
    /// Send a single message
    Send {
        /// Message content
        message: String,
    },
    /// Send a message and print the reply as it streams
    Stream {
        /// Message content
        message: String,
    },
    /// Start a new conversation for the session
    NewSession,
    /// Send one prompt per input line, each in a fresh conversation, and
    /// write the replies to a CSV file
    Batch {
        /// Input file, one prompt per line
        input: String,
        /// Output CSV path
        output: String,
    },
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    session_id: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    response: String,
    session_id: String,
    conversation_id: Option<String>,
}

#[derive(Serialize)]
struct NewSessionRequest<'a> {
    session_id: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct NewSessionResponse {
    session_id: String,
    message: String,
}

#[derive(Deserialize, Debug, Default)]
struct StreamPayload {
    chunk: Option<String>,
    #[serde(default)]
    done: bool,
    session_id: Option<String>,
    conversation_id: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize, Debug)]
struct ErrorDetail {
    message: String,
}

struct Gateway {
    http: reqwest::Client,
    server_url: String,
    api_key: Option<String>,
}

impl Gateway {
    fn new(cli: &Cli) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_url: cli.server_url.trim_end_matches('/').to_string(),
            api_key: cli.api_key.clone(),
        }
    }

    fn post(&self, route: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.post(format!("{}{}", self.server_url, route));
        if let Some(key) = &self.api_key {
            builder = builder.header("X-API-Key", key);
        }
        builder
    }

    async fn chat(&self, message: &str, session_id: Option<&str>) -> anyhow::Result<ChatResponse> {
        let response = self
            .post("/chat")
            .json(&ChatRequest {
                message,
                session_id,
            })
            .send()
            .await?;
        read_json(response).await
    }

    async fn new_session(&self, session_id: Option<&str>) -> anyhow::Result<NewSessionResponse> {
        let response = self
            .post("/session/new")
            .json(&NewSessionRequest { session_id })
            .send()
            .await?;
        read_json(response).await
    }
}

/// Parse a success body, or surface the gateway's structured error message.
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> anyhow::Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error.message,
        Err(_) => format!("gateway returned status {status}"),
    };
    anyhow::bail!(message)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        eprintln!(
            "{}",
            format!("[DEBUG] Server URL: {}", cli.server_url).dimmed()
        );
    }

    let gateway = Gateway::new(&cli);
    match &cli.command {
        Commands::Chat => run_interactive_chat(&gateway, cli.session_id.clone(), cli.debug).await,
        Commands::Send { message } => send_message(&gateway, cli.session_id.as_deref(), message).await,
        Commands::Stream { message } => {
            stream_message(&gateway, cli.session_id.as_deref(), message).await
        }
        Commands::NewSession => new_session(&gateway, cli.session_id.as_deref()).await,
        Commands::Batch { input, output } => run_batch(&gateway, input, output).await,
    }
}

async fn run_interactive_chat(
    gateway: &Gateway,
    mut session_id: Option<String>,
    debug: bool,
) -> anyhow::Result<()> {
    println!("{}", "Interactive conversation".bold());
    println!("Type a message; 'new' starts a fresh conversation, 'quit' exits.\n");

    let stdin = io::stdin();
    loop {
        print!("{} ", "you>".blue().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            "quit" | "exit" => break,
            "new" => {
                session_id = None;
                println!("{}\n", "Started a new conversation.".yellow());
                continue;
            }
            _ => {}
        }

        match gateway.chat(input, session_id.as_deref()).await {
            Ok(reply) => {
                println!("\n{} {}\n", "assistant>".green().bold(), reply.response);
                if debug {
                    eprintln!(
                        "{}",
                        format!(
                            "[DEBUG] session {} conversation {}",
                            reply.session_id,
                            reply.conversation_id.as_deref().unwrap_or("-")
                        )
                        .dimmed()
                    );
                }
                session_id = Some(reply.session_id);
            }
            Err(err) => eprintln!("{} {err}\n", "error:".red().bold()),
        }
    }

    println!("Bye.");
    Ok(())
}

async fn send_message(
    gateway: &Gateway,
    session_id: Option<&str>,
    message: &str,
) -> anyhow::Result<()> {
    let reply = gateway.chat(message, session_id).await?;
    println!("{}", reply.response);
    eprintln!("{}", format!("session: {}", reply.session_id).dimmed());
    Ok(())
}

async fn stream_message(
    gateway: &Gateway,
    session_id: Option<&str>,
    message: &str,
) -> anyhow::Result<()> {
    let response = gateway
        .post("/chat/stream")
        .json(&ChatRequest {
            message,
            session_id,
        })
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("gateway returned status {status}");
    }

    let mut events = response.bytes_stream().eventsource();
    while let Some(event) = events.next().await {
        let event = event?;
        let payload: StreamPayload = match serde_json::from_str(&event.data) {
            Ok(payload) => payload,
            Err(_) => continue,
        };

        if let Some(error) = payload.error {
            eprintln!("\n{} {error}", "error:".red().bold());
            break;
        }
        if let Some(chunk) = payload.chunk {
            print!("{chunk}");
            io::stdout().flush()?;
        }
        if payload.done {
            println!();
            eprintln!(
                "{}",
                format!(
                    "session: {} conversation: {}",
                    payload.session_id.as_deref().unwrap_or("-"),
                    payload.conversation_id.as_deref().unwrap_or("-")
                )
                .dimmed()
            );
            break;
        }
    }
    Ok(())
}

async fn new_session(gateway: &Gateway, session_id: Option<&str>) -> anyhow::Result<()> {
    let reply = gateway.new_session(session_id).await?;
    println!("{} ({})", reply.message, reply.session_id);
    Ok(())
}

async fn run_batch(gateway: &Gateway, input: &str, output: &str) -> anyhow::Result<()> {
    let prompts = std::fs::read_to_string(input)?;
    let prompts: Vec<&str> = prompts
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut out = std::fs::File::create(output)?;
    writeln!(out, "index,prompt,response,conversation_id")?;

    for (index, prompt) in prompts.iter().enumerate() {
        // No session id: every prompt runs in its own fresh conversation.
        let reply = match gateway.chat(prompt, None).await {
            Ok(reply) => reply,
            Err(err) => {
                eprintln!("{} prompt {index}: {err}", "error:".red().bold());
                writeln!(out, "{index},{},{},", csv_escape(prompt), csv_escape("Error"))?;
                continue;
            }
        };
        writeln!(
            out,
            "{index},{},{},{}",
            csv_escape(prompt),
            csv_escape(&reply.response),
            reply.conversation_id.as_deref().unwrap_or("")
        )?;
        println!("[{}/{}] done", index + 1, prompts.len());
    }

    println!("Wrote {} results to {output}", prompts.len());
    Ok(())
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
