//! Connect subcommand implementation

use super::input::{self, Input};
use anyhow::{bail, Context, Result};
use chatlink::prelude::*;
use chatlink_observability::{init_tracing, LogFormat, TracingConfig};
use chrono::{Local, TimeZone};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Usernames longer than this are refused before connecting.
const MAX_USERNAME_CHARS: usize = 20;

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Server host; may include a scheme and port (http://host:port)
    #[arg(long, env = "CHATLINK_HOST")]
    host: Option<String>,

    /// Server port
    #[arg(long, env = "CHATLINK_PORT")]
    port: Option<u16>,

    /// Name to join the room as
    #[arg(long, env = "CHATLINK_USERNAME")]
    username: Option<String>,

    /// Remember host, port and username after a successful connect
    #[arg(long)]
    remember: bool,

    /// Directory received files are written to
    #[arg(long, env = "CHATLINK_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// Settings file (defaults to the per-user config directory)
    #[arg(long, env = "CHATLINK_SETTINGS")]
    settings: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    /// Log output format (text or json)
    #[arg(long, default_value = "text", env = "CHATLINK_LOG_FORMAT")]
    log_format: LogFormat,
}

pub async fn run(args: ConnectArgs) -> Result<()> {
    init_tracing(&TracingConfig {
        default_level: args.log_level.clone(),
        format: args.log_format,
    })?;

    let store = super::settings_store(args.settings.clone())?;
    let saved = store.load().prefill();

    let host = args.host.clone().unwrap_or(saved.host);
    let port = args.port.unwrap_or(saved.port);
    let username = args
        .username
        .clone()
        .unwrap_or(saved.username)
        .trim()
        .to_string();

    if username.is_empty() {
        bail!("A username is required (--username or CHATLINK_USERNAME)");
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        bail!("Username must be at most {MAX_USERNAME_CHARS} characters");
    }

    let mut builder = ChatClient::builder();
    if let Some(dir) = &args.download_dir {
        builder = builder.object_store(Arc::new(FsObjectStore::new(dir)));
    }
    let (client, events) = builder.build()?;
    let printer = tokio::spawn(print_events(events));

    info!("Starting chatlink v{}", env!("CARGO_PKG_VERSION"));
    println!("Connecting to {host}:{port} as {username}...");
    if let Err(e) = client.connect(&host, port, &username).await {
        drop(client);
        finish(printer).await;
        return Err(e).context("Could not join the chat room");
    }

    if args.remember {
        let settings = Settings {
            host,
            port,
            username,
            remember: true,
            last_connection_success: true,
        };
        if let Err(e) = store.save(&settings) {
            warn!("Could not save settings: {}", e);
        }
    }

    println!("Type a message and press Enter. /image <path>, /file <path> <type>, /quit");
    chat_loop(&client).await?;

    client.disconnect().await;
    drop(client);
    finish(printer).await;
    Ok(())
}

async fn chat_loop(client: &ChatClient) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            return Ok(());
        };

        let result = match input::parse(&line) {
            Input::Empty => continue,
            Input::Quit => return Ok(()),
            Input::Usage(usage) => {
                eprintln!("usage: {usage}");
                continue;
            }
            Input::Text(text) => client.send_text_message(&text).await,
            Input::Image(path) => send_image(client, &path).await,
            Input::File { path, file_type } => {
                let name = file_name(&path);
                client.send_file_message(&path, &name, &file_type).await
            }
        };

        if let Err(e) = result {
            eprintln!("! {e}");
        }
    }
}

async fn send_image(client: &ChatClient, path: &Path) -> chatlink::Result<()> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ChatError::FileNotFound(path.to_path_buf())
        } else {
            ChatError::Io(e)
        }
    })?;
    client.send_image_message(&bytes, &file_name(path)).await
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

async fn print_events(mut events: EventStream) {
    while let Some(event) = events.recv().await {
        println!("{}", render(&event));
    }
}

/// Wait briefly for the printer to drain once the client is gone.
async fn finish(printer: JoinHandle<()>) {
    if tokio::time::timeout(Duration::from_secs(1), printer)
        .await
        .is_err()
    {
        warn!("Event printer did not finish");
    }
}

fn clock(timestamp_ms: i64) -> String {
    Local
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .map_or_else(|| "--:--:--".to_string(), |t| t.format("%H:%M:%S").to_string())
}

fn render(event: &ClientEvent) -> String {
    match event {
        ClientEvent::Connected => "* connected".to_string(),
        ClientEvent::Disconnected => "* disconnected".to_string(),
        ClientEvent::Error(reason) => format!("! {reason}"),
        ClientEvent::VersionMismatch(required) => {
            format!("! server requires client version {required}")
        }
        ClientEvent::Message(ChatEvent::Text {
            sender,
            content,
            timestamp,
        }) => format!("[{}] {sender}: {content}", clock(*timestamp)),
        ClientEvent::Message(ChatEvent::System { content, timestamp }) => {
            format!("[{}] * {content}", clock(*timestamp))
        }
        ClientEvent::Message(ChatEvent::Image {
            sender,
            file_name,
            reference,
            timestamp,
            ..
        }) => match reference {
            Some(reference) => format!(
                "[{}] {sender} sent {file_name} (saved to {reference})",
                clock(*timestamp)
            ),
            None => format!("[{}] {sender} sent {file_name} (not saved)", clock(*timestamp)),
        },
    }
}
