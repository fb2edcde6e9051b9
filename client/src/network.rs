//! WebSocket connection to the server with automatic reconnect.
//!
//! The connection runs in its own task. Outgoing [`ClientMessage`]s are
//! queued through [`NetworkClient::send`]; everything coming back is
//! delivered as a [`ClientEvent`] on the receiver returned by
//! [`NetworkClient::spawn`].

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::protocol::{ClientMessage, ProtocolError, ServerMessage};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
pub const RECONNECT_BACKOFF: f32 = 1.5;
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(10);
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Message(ServerMessage),
    Disconnected,
    Reconnecting { attempt: u32, delay: Duration },
    /// Reconnect budget exhausted; the connection task has stopped.
    GaveUp,
}

/// Why a live connection ended.
#[derive(Debug, PartialEq, Eq)]
enum ConnectionEnd {
    /// Every [`NetworkClient`] handle was dropped.
    Closed,
    /// The server went away.
    Lost,
}

/// Delay before reconnect `attempt` (1-based): one second, growing by half
/// each attempt, capped at ten seconds.
pub fn reconnect_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32) as i32;
    let delay = INITIAL_RECONNECT_DELAY.as_secs_f32() * RECONNECT_BACKOFF.powi(exponent);
    Duration::from_secs_f32(delay.min(MAX_RECONNECT_DELAY.as_secs_f32()))
}

/// Handle for sending messages to the server.
#[derive(Debug, Clone)]
pub struct NetworkClient {
    outbound: mpsc::UnboundedSender<ClientMessage>,
}

impl NetworkClient {
    /// Starts connecting to `url` (e.g. `ws://127.0.0.1:8080`) in the
    /// background.
    pub fn spawn(url: &str) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(url.to_string(), outbound_rx, events_tx));
        (
            Self {
                outbound: outbound_tx,
            },
            events_rx,
        )
    }

    /// Queues `message`. Messages queued while disconnected are discarded
    /// when the next connection opens.
    pub fn send(&self, message: ClientMessage) -> bool {
        self.outbound.send(message).is_ok()
    }
}

async fn run_connection(
    url: String,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientMessage>,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
) {
    let mut attempt = 0;

    loop {
        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                info!("Connected to {}", url);
                attempt = 0;
                while outbound_rx.try_recv().is_ok() {}
                if events_tx.send(ClientEvent::Connected).is_err() {
                    return;
                }

                let end = pump(socket, &mut outbound_rx, &events_tx).await;
                let _ = events_tx.send(ClientEvent::Disconnected);
                if end == ConnectionEnd::Closed || events_tx.is_closed() {
                    return;
                }
                warn!("Lost connection to {}", url);
            }
            Err(e) => warn!("Failed to connect to {}: {}", url, e),
        }

        attempt += 1;
        if attempt > MAX_RECONNECT_ATTEMPTS {
            warn!("Giving up on {} after {} attempts", url, MAX_RECONNECT_ATTEMPTS);
            let _ = events_tx.send(ClientEvent::GaveUp);
            return;
        }
        let delay = reconnect_delay(attempt);
        info!("Reconnecting in {:?} (attempt {})", delay, attempt);
        if events_tx
            .send(ClientEvent::Reconnecting { attempt, delay })
            .is_err()
        {
            return;
        }
        tokio::time::sleep(delay).await;
    }
}

/// Moves frames in both directions until either side closes.
async fn pump(
    socket: Socket,
    outbound_rx: &mut mpsc::UnboundedReceiver<ClientMessage>,
    events_tx: &mpsc::UnboundedSender<ClientEvent>,
) -> ConnectionEnd {
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                let Some(message) = outgoing else {
                    let _ = write.send(Message::Close(None)).await;
                    return ConnectionEnd::Closed;
                };
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("{}", e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(text)).await {
                    debug!("Send failed: {}", e);
                    return ConnectionEnd::Lost;
                }
            },

            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => match ServerMessage::from_json(&text) {
                        Ok(message) => {
                            if events_tx.send(ClientEvent::Message(message)).is_err() {
                                return ConnectionEnd::Closed;
                            }
                        }
                        Err(e) => warn!("Dropping server message: {}", e),
                    },
                    Some(Ok(Message::Binary(_))) => {
                        warn!("{}", ProtocolError::UnexpectedFrame("binary"));
                    }
                    Some(Ok(Message::Close(_))) | None => return ConnectionEnd::Lost,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Receive failed: {}", e);
                        return ConnectionEnd::Lost;
                    }
                }
            },
        }
    }
}
