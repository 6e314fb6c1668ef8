use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use cli::session::{self, Command, SessionConfig, SessionEvent, SessionHandle};
use cli::{Replica, SessionError};
use protocol::{DEFAULT_COLOR, DEFAULT_STROKE_WIDTH, ServerMessage, Shape};
use serde_json::Value;
use uuid::Uuid;

/// How long a one-shot command waits for the broker.
const ONE_SHOT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser, Debug)]
#[command(name = "sketchroom", about = "Sketchroom broker health checks and room session client")]
struct Cli {
    #[arg(long, env = "SKETCHROOM_URL", default_value = "http://127.0.0.1:3000")]
    url: String,

    /// Session token; omit to connect as a demo guest.
    #[arg(long, env = "SKETCHROOM_TOKEN")]
    token: Option<String>,

    /// Automatic reconnect attempts before giving up.
    #[arg(long, default_value_t = cli::reconnect::DEFAULT_MAX_ATTEMPTS)]
    max_retries: u32,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// GET /health.
    Health,
    /// Websocket ping/pong round trip.
    Ping,
    /// Join a room and print every event until interrupted.
    Watch { room: String },
    /// Draw a rectangle in a room.
    DrawRect(DrawRectArgs),
    /// Send a chat message to a room.
    Chat { room: String, text: String },
    /// Clear every shape in a room.
    Clear { room: String },
}

#[derive(Args, Debug)]
struct DrawRectArgs {
    room: String,
    #[arg(allow_hyphen_values = true)]
    x: f64,
    #[arg(allow_hyphen_values = true)]
    y: f64,
    #[arg(allow_hyphen_values = true)]
    width: f64,
    #[arg(allow_hyphen_values = true)]
    height: f64,
    #[arg(long, default_value = DEFAULT_COLOR)]
    color: String,
    #[arg(long, default_value_t = DEFAULT_STROKE_WIDTH)]
    stroke_width: f64,
}

#[tokio::main]
async fn main() -> Result<(), SessionError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = SessionConfig { token: cli.token, max_retries: cli.max_retries, ..SessionConfig::new(cli.url) };

    match cli.command {
        CliCommand::Health => run_health(&config).await,
        CliCommand::Ping => run_ping(&config).await,
        CliCommand::Watch { room } => run_watch(config, room).await,
        CliCommand::DrawRect(args) => {
            let shape = Shape::Rect {
                x: args.x,
                y: args.y,
                width: args.width,
                height: args.height,
                color: args.color,
                stroke_width: args.stroke_width,
            };
            let replica = run_one_shot(config, args.room, Command::Draw(shape), "draw").await?;
            println!("ok shapes={}", replica.shapes().len());
            Ok(())
        }
        CliCommand::Chat { room, text } => {
            run_one_shot(config, room, Command::Chat(text), "chat_message").await?;
            println!("ok");
            Ok(())
        }
        CliCommand::Clear { room } => {
            run_one_shot(config, room, Command::Clear, "clear_all").await?;
            println!("ok");
            Ok(())
        }
    }
}

async fn run_health(config: &SessionConfig) -> Result<(), SessionError> {
    let url = format!("{}/health", config.url.trim_end_matches('/'));
    let response = reqwest::Client::new().get(url).send().await?;
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    if !status.is_success() {
        return Err(SessionError::Server { code: format!("HTTP {}", status.as_u16()), message: body.to_string() });
    }
    println!("{body}");
    Ok(())
}

async fn run_ping(config: &SessionConfig) -> Result<(), SessionError> {
    let rtt = session::ping_once(&config.url, config.token.as_deref(), ONE_SHOT_TIMEOUT).await?;
    println!("pong in {} ms", rtt.as_millis());
    Ok(())
}

/// Print every broker message as one JSON line until Ctrl-C.
async fn run_watch(config: SessionConfig, room: String) -> Result<(), SessionError> {
    let mut handle = session::spawn(SessionConfig { room_id: Some(room), ..config });
    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else { break };
                print_event(&event)?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    let replica = handle.close().await?;
    eprintln!(
        "watch complete: room={} shapes={} chats={}",
        replica.room_id().unwrap_or("-"),
        replica.shapes().len(),
        replica.chats().len()
    );
    Ok(())
}

fn print_event(event: &SessionEvent) -> Result<(), SessionError> {
    match event {
        SessionEvent::Message { message, shape_count, .. } => {
            println!("{}", protocol::encode_server(message)?);
            if matches!(
                message,
                ServerMessage::RoomState { .. }
                    | ServerMessage::Draw { .. }
                    | ServerMessage::Erase { .. }
                    | ServerMessage::ClearAll { .. }
            ) {
                eprintln!("shapes={shape_count}");
            }
        }
        SessionEvent::Reconnecting { attempt, delay } => {
            eprintln!("reconnecting: attempt={attempt} delay_ms={}", delay.as_millis());
        }
    }
    Ok(())
}

/// Join `room`, send one command once the replay arrived, and wait for the
/// broker to echo it back.
async fn run_one_shot(
    config: SessionConfig,
    room: String,
    command: Command,
    echo_kind: &str,
) -> Result<Replica, SessionError> {
    let mut handle = session::spawn(SessionConfig { room_id: Some(room), ..config });
    let outcome = tokio::time::timeout(ONE_SHOT_TIMEOUT, await_echo(&mut handle, command, echo_kind)).await;
    let replica = handle.close().await;
    match outcome {
        Ok(Ok(())) => replica,
        // The task's own error says why the event stream ended.
        Ok(Err(SessionError::Closed)) => replica.and(Err(SessionError::Closed)),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(SessionError::Timeout),
    }
}

async fn await_echo(handle: &mut SessionHandle, command: Command, echo_kind: &str) -> Result<(), SessionError> {
    let mut me: Option<Uuid> = None;
    let mut command = Some(command);
    while let Some(event) = handle.next_event().await {
        let SessionEvent::Message { message, .. } = event else {
            continue;
        };
        match &message {
            ServerMessage::Connected { connection_id, .. } => me = Some(*connection_id),
            ServerMessage::RoomState { .. } => {
                if let Some(command) = command.take() {
                    handle.send(command).await?;
                }
            }
            ServerMessage::Error { code, message, .. } => {
                return Err(SessionError::Server { code: code.clone(), message: message.clone() });
            }
            other if other.kind() == echo_kind && me.is_some() && other.origin() == me => {
                return Ok(());
            }
            _ => {}
        }
    }
    Err(SessionError::Closed)
}
