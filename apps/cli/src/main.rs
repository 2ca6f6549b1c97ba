use std::{collections::HashSet, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    config::{load_settings, normalize_server_url},
    ChatClient, ClientEvent, FileIdentityStore, SyncError, TracingNotifier, WebSocketTransport,
};
use shared::domain::{MessageKey, Username};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod render;

use commands::CliCommand;

#[derive(Parser, Debug)]
#[command(about = "Terminal client for one-to-one chat")]
struct Args {
    /// Overrides `server_url` from the settings file.
    #[arg(long)]
    server_url: Option<String>,
    /// Registers this name when no saved identity exists.
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long)]
    optimistic_send: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,client_core=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = &args.server_url {
        settings.server_url = normalize_server_url(url)?;
    }
    if let Some(dir) = args.data_dir {
        settings.data_dir = dir;
    }
    settings.optimistic_send |= args.optimistic_send;
    info!(server_url = %settings.server_url, data_dir = %settings.data_dir.display(), "cli: starting");

    let transport = Arc::new(WebSocketTransport::new(
        settings.server_url.clone(),
        settings.reconnect_policy(),
    ));
    let client = ChatClient::new(
        transport.clone(),
        Arc::new(TracingNotifier),
        Arc::new(FileIdentityStore::in_dir(&settings.data_dir)),
        settings.sync_settings(),
    );
    let printer = tokio::spawn(print_events(client.subscribe_events()));

    client.start().await?;
    match client.resume_persisted_session()? {
        Some(user) => println!("signed in as {user}"),
        None => match args.username.as_deref() {
            Some(name) => client.register(name)?,
            None => println!("not signed in; use /register <name>"),
        },
    }
    println!("type /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if command == CliCommand::Quit {
            break;
        }
        if let Err(err) = run_command(&client, command) {
            match err.downcast_ref::<SyncError>() {
                Some(sync) if !sync.is_user_facing() => warn!(error = %sync, "cli: command dropped"),
                _ => println!("error: {err}"),
            }
        }
    }

    client.shutdown();
    transport.close();
    printer.abort();
    Ok(())
}

fn run_command(client: &ChatClient, command: CliCommand) -> Result<()> {
    match command {
        CliCommand::Register(name) => client.register(&name)?,
        CliCommand::Open(peer) => client.select_peer(&peer)?,
        CliCommand::Close => client.close_conversation()?,
        CliCommand::Users => println!("{}", render::roster(&client.snapshot())),
        CliCommand::Logout => client.logout()?,
        CliCommand::Help => println!("{}", commands::HELP),
        CliCommand::Send(text) => client.send_message(&text)?,
        CliCommand::Quit => {}
    }
    Ok(())
}

/// Prints the open conversation incrementally and surfaces notifications
/// and errors.
async fn print_events(events: broadcast::Receiver<ClientEvent>) {
    let mut stream = BroadcastStream::new(events);
    let mut status = String::new();
    let mut shown_peer: Option<Username> = None;
    let mut shown: HashSet<MessageKey> = HashSet::new();

    while let Some(event) = stream.next().await {
        match event {
            Ok(ClientEvent::SnapshotUpdated(snapshot)) => {
                let line = render::status_line(&snapshot);
                if line != status {
                    println!("-- {line}");
                    status = line;
                }
                if snapshot.selected_peer != shown_peer {
                    shown_peer = snapshot.selected_peer.clone();
                    shown.clear();
                }
                for message in &snapshot.conversation {
                    if shown.insert(message.key()) {
                        println!(
                            "{}",
                            render::message_line(message, snapshot.current_user.as_ref())
                        );
                    }
                }
            }
            Ok(ClientEvent::Notification(notification)) => println!(
                "* {} ({} unread): {}",
                notification.from, notification.unread, notification.preview
            ),
            Ok(ClientEvent::Error(message)) => println!("! {message}"),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "cli: event stream lagged");
            }
        }
    }
}
