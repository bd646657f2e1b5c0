use std::time::Duration;

use rookery::prelude::*;
use rookery::protocol::ProtocolError;
use tracing_subscriber::EnvFilter;

/// Command code this demo uses for chat lines.
const CHAT: u16 = 1;

/// Matchmaking tag and room size the demo asks for.
const MATCH_TAG: &str = "lobby-demo";
const MATCH_CAPACITY: u16 = 4;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Chat bodies are a single length-prefixed string.
fn chat_text(message: &UserMessage) -> Result<String, ProtocolError> {
    message.reader().read()
}

fn register<T: Transport, D: Discovery>(client: &mut Client<T, D>) -> Result<(), RookeryError> {
    let lobby = client.lobby_handle();
    client.register_handler(event::ON_ROOM_CREATED, move |_: &Frame| {
        let lobby = lobby.borrow();
        if let Some(room) = lobby.last_event().created_room.and_then(|id| lobby.room(id)) {
            tracing::info!(
                room = %room.id(),
                kind = %room.kind(),
                capacity = room.capacity(),
                "room created"
            );
        }
        Ok(())
    })?;

    let lobby = client.lobby_handle();
    client.register_handler(event::ON_USER_ENTERED_ROOM, move |_: &Frame| {
        if let Some(user) = &lobby.borrow().last_event().entered_user {
            tracing::info!(session = %user.session_id, room = %user.room_id, "user entered room");
        }
        Ok(())
    })?;

    client.on_user_message(CHAT, |message: &UserMessage| {
        let text = chat_text(message)?;
        tracing::info!(from = %message.origin(), %text, "chat");
        Ok(())
    })?;

    client.on_client_error(error_code::BAD_REQUEST, |report: &ErrorReport| {
        tracing::warn!(code = report.code(), "server rejected a request");
        Ok(())
    })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

fn config_from_env() -> Result<ClientConfig, Box<dyn std::error::Error>> {
    match std::env::var("ROOKERY_CONFIG") {
        Ok(path) => Ok(ClientConfig::from_json(&std::fs::read_to_string(path)?)?),
        Err(_) => Ok(ClientConfig::default()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let credential = Credential::parse(&std::env::var("ROOKERY_CREDENTIAL")?);
    let host = std::env::var("ROOKERY_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("ROOKERY_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(7000);

    let mut client = ClientBuilder::new().config(config_from_env()?).build(
        credential,
        TcpTransport::new(),
        StaticDiscovery::new(ServerDescriptor::new(host, port)),
    );
    register(&mut client)?;
    client.start()?;
    client.room_match(MATCH_TAG, MATCH_CAPACITY)?;

    let mut ticker = tokio::time::interval(Duration::from_millis(16));
    loop {
        tokio::select! {
            _ = ticker.tick() => client.tick()?,
            _ = tokio::signal::ctrl_c() => break,
        }
        if !client.is_connected() {
            tracing::info!("server closed the session");
            return Ok(());
        }
    }

    client.stop()?;
    Ok(())
}
