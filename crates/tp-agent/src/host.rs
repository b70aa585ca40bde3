//! Host message channel.
//!
//! The host writes one JSON object per line. Tab and window callbacks go to
//! the tracker; control messages adjust reachability, the tracking toggle or
//! ask for status, which is answered as one JSON line on the writer.

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tp_core::{HostEvent, TabInfo};

use crate::agent::{FlushTrigger, Message};
use crate::connectivity::HostReachability;

/// Anything the host may send.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum HostMessage {
    Event(HostEvent),
    Control(ControlMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Host-reported reachability.
    Connectivity { online: bool },
    SetTracking { enabled: bool },
    Status,
    Flush,
    /// The focused tab at connect time.
    Snapshot {
        #[serde(default)]
        focused_tab: Option<TabInfo>,
    },
}

/// Reads host messages until EOF, then asks the agent to shut down.
///
/// Malformed lines are logged and skipped.
///
/// # Errors
///
/// Returns an error if reading the input or writing a status reply fails.
pub async fn serve_host<R, W>(
    reader: R,
    writer: &mut W,
    tx: mpsc::Sender<Message>,
    reachability: HostReachability,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("failed to read host input")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let message = match serde_json::from_str::<HostMessage>(line) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring malformed host message");
                continue;
            }
        };

        let forward = match message {
            HostMessage::Event(event) => Message::Host(event),
            HostMessage::Control(ControlMessage::Connectivity { online }) => {
                reachability.set(online);
                continue;
            }
            HostMessage::Control(ControlMessage::SetTracking { enabled }) => {
                Message::SetTracking(enabled)
            }
            HostMessage::Control(ControlMessage::Flush) => Message::Flush(FlushTrigger::Requested),
            HostMessage::Control(ControlMessage::Snapshot { focused_tab }) => {
                Message::Snapshot(focused_tab)
            }
            HostMessage::Control(ControlMessage::Status) => {
                let (reply, answer) = oneshot::channel();
                if tx.send(Message::Status(reply)).await.is_err() {
                    break;
                }
                let Ok(status) = answer.await else { break };
                let mut json = serde_json::to_vec(&status).context("failed to encode status")?;
                json.push(b'\n');
                writer
                    .write_all(&json)
                    .await
                    .context("failed to write status")?;
                writer.flush().await.context("failed to write status")?;
                continue;
            }
        };
        if tx.send(forward).await.is_err() {
            break;
        }
    }

    tracing::info!("host input closed");
    let _ = tx.send(Message::Shutdown).await;
    Ok(())
}
