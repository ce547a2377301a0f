use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use virgil_voice::session::{self, SessionEvent, VoiceSession};
use virgil_voice::{AppState, Config};

#[derive(Parser)]
#[command(name = "virgil-voice", version, about = "Native voice client for the Virgil assistant")]
struct Cli {
    /// Config file path, without extension
    #[arg(long, default_value = "config/virgil-voice")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive voice session in the terminal
    Run,
    /// Serve the HTTP control API
    Serve,
    /// Send one typed utterance and print the reply
    Text { message: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let (session, events) = session::bootstrap(&cfg)?;
    info!("Session id: {}", session.session_id());

    match cli.command {
        Command::Run => run_interactive(session, events).await,
        Command::Serve => serve(&cfg, session, events).await,
        Command::Text { message } => text_once(session, events, &message).await,
    }
}

/// Print session events the way a status line would render them.
async fn print_events(mut events: mpsc::Receiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Status { line } => println!("* {line}"),
            SessionEvent::Thinking => println!("* thinking..."),
            SessionEvent::Utterance {
                transcript, reply, ..
            } => {
                if let Some(text) = transcript {
                    println!("You: {text}");
                }
                println!("Virgil: {reply}");
            }
            SessionEvent::Recognized { text } => println!("You (recognized): {text}"),
            SessionEvent::Error { message } => eprintln!("! {message}"),
            // Too chatty for a line-based terminal
            SessionEvent::Level { .. } => {}
        }
    }
}

async fn run_interactive(session: VoiceSession, events: mpsc::Receiver<SessionEvent>) -> Result<()> {
    println!("Enter toggles the microphone. Type to chat, /say replays the reply aloud,");
    println!("/stop halts playback, /quit exits.");

    let printer = tokio::spawn(print_events(events));

    if session.connect().await.is_err() {
        warn!("Initial connect failed; will fall back or retry on demand");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match line.trim() {
            "" => {
                let stats = session.stats().await;
                let capturing = stats.state.capture
                    != virgil_voice::session::CaptureState::Idle
                    || stats.state.fallback == virgil_voice::session::FallbackState::Listening;
                let result = if capturing {
                    session.stop_capture().await
                } else {
                    session.start_capture().await
                };
                if let Err(e) = result {
                    // Already surfaced as an event; keep the prompt alive.
                    tracing::debug!("Toggle failed: {}", e);
                }
            }
            "/quit" | "/q" => break,
            "/say" => {
                let _ = session.speak_last_reply().await;
            }
            "/stop" => session.stop_playback().await,
            text => {
                let _ = session.send_text(text).await;
            }
        }
    }

    session.teardown().await;
    printer.abort();
    Ok(())
}

async fn serve(
    cfg: &Config,
    session: VoiceSession,
    events: mpsc::Receiver<SessionEvent>,
) -> Result<()> {
    // Nobody is watching the terminal in serve mode; route events to the log.
    tokio::spawn(log_events(events));

    if session.connect().await.is_err() {
        warn!("Initial connect failed; the control API can retry via /voice/connect");
    }

    let state = AppState::new(session.clone());
    let app = virgil_voice::create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    info!("Control API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    session.teardown().await;
    Ok(())
}

async fn log_events(mut events: mpsc::Receiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Status { line } => info!("{}", line),
            SessionEvent::Thinking => info!("Backend is processing"),
            SessionEvent::Utterance {
                transcript, reply, ..
            } => info!(?transcript, reply = %reply, "Utterance completed"),
            SessionEvent::Recognized { text } => {
                info!(text = %text, "Fallback utterance recognized")
            }
            SessionEvent::Error { message } => warn!("{}", message),
            SessionEvent::Level { .. } => {}
        }
    }
}

async fn text_once(
    session: VoiceSession,
    mut events: mpsc::Receiver<SessionEvent>,
    message: &str,
) -> Result<()> {
    session.connect().await?;
    session.send_text(message).await?;

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Utterance { reply, .. } => {
                println!("{reply}");
                break;
            }
            SessionEvent::Error { message } => {
                eprintln!("! {message}");
                break;
            }
            _ => {}
        }
    }

    session.teardown().await;
    Ok(())
}
