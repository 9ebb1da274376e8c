use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::Link;
use crate::{Result, VisError};

/// Opens a websocket to `url` and bridges it onto a [`Link`].
///
/// Two pump tasks are spawned on the current runtime. When the socket
/// closes or fails, the link's inbound channel closes with it; nothing
/// attempts to reconnect.
pub async fn connect(url: &str) -> Result<Link> {
    let (socket, _response) = connect_async(url)
        .await
        .map_err(|err| VisError::Transport(err.to_string()))?;
    tracing::info!(url, "websocket connected");

    let (mut sink, mut stream) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let (inbound_tx, inbound) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if let Err(err) = sink.send(Message::Text(text)).await {
                tracing::warn!(%err, "websocket send failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if inbound_tx.send(text).is_err() {
                        break;
                    }
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!(?frame, "websocket closed by peer");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(%err, "websocket receive failed");
                    break;
                }
            }
        }
    });

    Ok(Link { outbound, inbound })
}
