use std::collections::HashSet;
use std::path::Path;

use clap::{Args, Parser, Subcommand};
use client::{ApiClient, ClientConfig, ClientError, OutgoingAttachment, SessionHandle, SessionSnapshot, SessionUser};
use protocol::{BoardUpdate, ChatMessage, NewBoard};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check failed: HTTP {0}")]
    Unhealthy(u16),
    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "boardchat", about = "Discussion board REST and realtime chat CLI")]
struct Cli {
    #[arg(long, env = "BOARDCHAT_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Api(ApiCommand),
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
struct ApiCommand {
    #[command(subcommand)]
    command: ApiSubcommand,
}

#[derive(Subcommand, Debug)]
enum ApiSubcommand {
    /// List the boards of a project.
    Boards { project_id: Uuid },
    /// Show one board with its project and posts.
    Board { board_id: Uuid },
    /// Print a board's message history, oldest first.
    History { board_id: Uuid },
    CreateBoard {
        #[arg(long)]
        project_id: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, env = "BOARDCHAT_USER_ID")]
        created_by: Uuid,
    },
    /// Rename a board. Omitting `--description` clears it.
    UpdateBoard {
        board_id: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ChatArgs {
    #[arg(long)]
    board_id: Uuid,

    #[arg(long, env = "BOARDCHAT_USER_ID")]
    user_id: Uuid,

    #[arg(long, env = "BOARDCHAT_USERNAME")]
    username: String,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ping => run_ping(&cli.base_url).await,
        Command::Api(api) => run_api(&cli.base_url, api).await,
        Command::Chat(args) => run_chat(&cli.base_url, args).await,
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let status = reqwest::get(url).await?.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

async fn run_api(base_url: &str, api: ApiCommand) -> Result<(), CliError> {
    let client = ApiClient::new(base_url);
    let json = match api.command {
        ApiSubcommand::Boards { project_id } => serde_json::to_value(client.fetch_project_boards(project_id).await?)?,
        ApiSubcommand::Board { board_id } => serde_json::to_value(client.fetch_board(board_id).await?)?,
        ApiSubcommand::History { board_id } => serde_json::to_value(client.fetch_board_posts(board_id).await?)?,
        ApiSubcommand::CreateBoard { project_id, name, description, created_by } => {
            let board = NewBoard { project_id, name, description, created_by_id: created_by };
            serde_json::to_value(client.create_board(&board).await?)?
        }
        ApiSubcommand::UpdateBoard { board_id, name, description } => {
            serde_json::to_value(client.update_board(board_id, &BoardUpdate { name, description }).await?)?
        }
    };
    print_json(&json)
}

// =============================================================================
// CHAT REPL
// =============================================================================

/// Interactive chat on one board. Plain lines are sent as messages;
/// `/attach <path> [text]` sends a file, `/quit` leaves.
async fn run_chat(base_url: &str, args: ChatArgs) -> Result<(), CliError> {
    let config = ClientConfig { base_url: base_url.to_owned(), ..ClientConfig::from_env() };
    let user = SessionUser { id: args.user_id, username: args.username };
    let (handle, task) = client::spawn_session(config, user);

    handle.select_board(args.board_id).await?;
    let printer = tokio::spawn(print_updates(handle.clone()));
    eprintln!("joined board {}; /attach <path> [text] to send a file, /quit to leave", args.board_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Quit => break,
            Input::Empty => {}
            Input::Text(text) => send(&handle, text, None).await,
            Input::Attach { path, text } => match read_attachment(Path::new(path)).await {
                Ok(attachment) => send(&handle, text, Some(attachment)).await,
                Err(error) => eprintln!("cannot attach {path}: {error}"),
            },
        }
    }

    handle.shutdown().await;
    printer.abort();
    let _ = task.await;
    Ok(())
}

async fn send(handle: &SessionHandle, text: &str, attachment: Option<OutgoingAttachment>) {
    if let Err(error) = handle.compose(text).await {
        eprintln!("{error}");
        return;
    }
    if let Err(error) = handle.submit(attachment).await {
        eprintln!("not sent: {error}");
    }
}

/// Print new messages, typing changes, and errors as snapshots arrive.
async fn print_updates(handle: SessionHandle) {
    let mut rx = handle.subscribe();
    let mut printed: HashSet<Uuid> = HashSet::new();
    let mut typing_line = String::new();
    let mut last_error: Option<String> = None;

    while rx.changed().await.is_ok() {
        let snapshot: SessionSnapshot = rx.borrow_and_update().clone();

        for message in &snapshot.messages {
            if printed.insert(message.id) {
                println!("{}", render_message(message));
            }
        }

        let names: Vec<&str> = snapshot.typing.iter().map(|u| u.username.as_str()).collect();
        let line = typing_status(&names);
        if line != typing_line {
            if !line.is_empty() {
                eprintln!("{line}");
            }
            typing_line = line;
        }

        if snapshot.last_error != last_error {
            if let Some(error) = &snapshot.last_error {
                eprintln!("error: {error}");
            }
            last_error = snapshot.last_error;
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Quit,
    Text(&'a str),
    Attach { path: &'a str, text: &'a str },
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    if trimmed == "/quit" {
        return Input::Quit;
    }
    if let Some(rest) = trimmed.strip_prefix("/attach ") {
        let rest = rest.trim_start();
        let (path, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        return Input::Attach { path, text: text.trim() };
    }
    Input::Text(trimmed)
}

async fn read_attachment(path: &Path) -> std::io::Result<OutgoingAttachment> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map_or_else(|| "attachment".to_owned(), |name| name.to_string_lossy().into_owned());
    Ok(OutgoingAttachment::from_bytes(file_name, media_type_for(path), &bytes))
}

fn media_type_for(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        Some("txt" | "md") => "text/plain",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

fn render_message(message: &ChatMessage) -> String {
    let mut out = format!("[{}] {}:", message.created_at.time(), message.user.username);
    if let Some(content) = &message.content {
        out.push(' ');
        out.push_str(content);
    }
    if let Some(name) = &message.file_name {
        out.push_str(&format!(" [attachment: {name}]"));
    }
    out
}

fn typing_status(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [one] => format!("{one} is typing..."),
        [first, second] => format!("{first} and {second} are typing..."),
        [first, rest @ ..] => format!("{first} and {} others are typing...", rest.len()),
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
