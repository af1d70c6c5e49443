//! WebSocket listener using tokio-tungstenite.
//!
//! Accepts TCP connections, performs the WebSocket upgrade in a per-socket
//! task, and hands finished connections to the server over a channel.

use futures_util::SinkExt;
use pairwire_core::{PairwireError, PairwireResult, ServerMessage};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

/// A handle to an accepted WebSocket connection.
pub struct WebSocketConnection {
    pub ws_stream: WebSocketStream<TcpStream>,
    pub remote_addr: SocketAddr,
}

/// Protocol limits for accepted sockets.
///
/// Messages and frames above `max_frame_bytes` fail inside tungstenite before
/// they are buffered, which closes the connection.
pub fn ws_config(max_frame_bytes: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_frame_bytes);
    config.max_frame_size = Some(max_frame_bytes);
    config
}

/// Start the WebSocket listener.
///
/// Returns the bound local address (useful when binding port 0) and a
/// receiver that yields accepted connections.
pub async fn start_listener(
    bind_addr: SocketAddr,
    max_frame_bytes: usize,
) -> PairwireResult<(SocketAddr, mpsc::Receiver<WebSocketConnection>)> {
    let tcp_listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| PairwireError::Transport(format!("WS bind failed: {e}")))?;
    let local_addr = tcp_listener.local_addr()?;

    info!(addr = %local_addr, "WebSocket listener started");

    let (tx, rx) = mpsc::channel::<WebSocketConnection>(64);

    tokio::spawn(async move {
        loop {
            match tcp_listener.accept().await {
                Ok((stream, addr)) => {
                    let tx = tx.clone();
                    let config = ws_config(max_frame_bytes);
                    tokio::spawn(async move {
                        match tokio_tungstenite::accept_async_with_config(stream, Some(config)).await {
                            Ok(ws_stream) => {
                                debug!(remote = %addr, "WebSocket connection accepted");
                                let conn = WebSocketConnection {
                                    ws_stream,
                                    remote_addr: addr,
                                };
                                if tx.send(conn).await.is_err() {
                                    warn!("WebSocket connection channel closed");
                                }
                            }
                            Err(e) => {
                                warn!(remote = %addr, error = %e, "WebSocket handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "TCP accept failed");
                }
            }
        }
    });

    Ok((local_addr, rx))
}

/// Helper: send a server message as a JSON text frame.
pub async fn ws_send_message<S>(sink: &mut S, msg: &ServerMessage) -> PairwireResult<()>
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = msg.to_json()?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| PairwireError::Transport(format!("WS send failed: {e}")))
}

/// Extract the text payload of a data frame.
///
/// Binary frames are accepted when they hold valid UTF-8. Control frames,
/// invalid UTF-8, and frames larger than `max_frame_bytes` yield `None`.
pub fn frame_text(msg: Message, max_frame_bytes: usize) -> Option<String> {
    match msg {
        Message::Text(text) => {
            if text.len() > max_frame_bytes {
                warn!(len = text.len(), max = max_frame_bytes, "WS text frame too large");
                return None;
            }
            Some(text.as_str().to_owned())
        }
        Message::Binary(data) => {
            if data.len() > max_frame_bytes {
                warn!(len = data.len(), max = max_frame_bytes, "WS binary frame too large");
                return None;
            }
            String::from_utf8(data.to_vec()).ok()
        }
        _ => None,
    }
}
