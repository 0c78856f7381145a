//! Per-connection command reader.
//!
//! One task per customer: read newline-framed commands, translate them into
//! engine calls under the global lock, and poke the tool wakeup after any
//! state change. Reader EOF or a transport error is an implicit `QUIT`.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use common::time::now_ms;
use customer::model::CustomerId;

use crate::notifier;
use crate::report;
use crate::shared::Shared;
use crate::transport::ClientStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Request(u64),
    Rest,
    Report,
    Quit,
}

/// Parse one line of the wire protocol.
///
/// Anything unrecognized — unknown verbs, missing, non-positive or
/// malformed durations — is `None` and gets ignored; `\r` counts as
/// whitespace and is tolerated.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "REQUEST" => {
            let ms: u64 = parts.next()?.parse().ok()?;
            (ms > 0).then_some(Command::Request(ms))
        }
        "REST" => Some(Command::Rest),
        "REPORT" => Some(Command::Report),
        "QUIT" => Some(Command::Quit),
        _ => None,
    }
}

pub async fn handle_connection(shared: Arc<Shared>, stream: Box<dyn ClientStream>, id: CustomerId) {
    let (read_half, write_half) = tokio::io::split(stream);
    let writer = Arc::new(Mutex::new(write_half));
    let mailbox = Arc::new(Notify::new());

    let slot = {
        let mut state = shared.state.lock().await;
        match state.connect(id, mailbox.clone(), now_ms()) {
            Ok(slot) => slot,
            Err(err) => {
                warn!(customer = id, %err, "rejecting connection");
                return;
            }
        }
    };
    shared.tool_wakeup.notify_waiters();

    let notifier = tokio::spawn(notifier::run(
        shared.clone(),
        slot,
        id,
        mailbox,
        writer.clone(),
    ));

    let mut lines = BufReader::new(read_half).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_command(&line) {
            Some(Command::Request(ms)) => {
                let mut state = shared.state.lock().await;
                state.request(slot, ms, now_ms());
                drop(state);
                shared.tool_wakeup.notify_waiters();
            }
            Some(Command::Rest) => {
                let mut state = shared.state.lock().await;
                state.rest(slot, now_ms());
                drop(state);
                shared.tool_wakeup.notify_waiters();
            }
            Some(Command::Report) => {
                // Snapshot under the lock, send outside it, so a slow peer
                // cannot stall the scheduler.
                let text = {
                    let state = shared.state.lock().await;
                    report::render(&state, now_ms())
                };
                let mut w = writer.lock().await;
                if w.write_all(text.as_bytes()).await.is_err() {
                    break;
                }
            }
            Some(Command::Quit) => break,
            None => debug!(customer = id, line = %line, "ignoring unrecognized command"),
        }
    }

    {
        let mut state = shared.state.lock().await;
        state.disconnect(slot, now_ms());
    }
    shared.tool_wakeup.notify_waiters();

    let _ = notifier.await;
    debug!(customer = id, "connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_every_verb() {
        assert_eq!(parse_command("REQUEST 500"), Some(Command::Request(500)));
        assert_eq!(parse_command("REST"), Some(Command::Rest));
        assert_eq!(parse_command("REPORT"), Some(Command::Report));
        assert_eq!(parse_command("QUIT"), Some(Command::Quit));
    }

    #[test]
    fn tolerates_carriage_returns_and_padding() {
        assert_eq!(parse_command("REQUEST 500\r"), Some(Command::Request(500)));
        assert_eq!(parse_command("  REST \r"), Some(Command::Rest));
    }

    #[test]
    fn drops_bad_durations() {
        assert_eq!(parse_command("REQUEST 0"), None);
        assert_eq!(parse_command("REQUEST -5"), None);
        assert_eq!(parse_command("REQUEST soon"), None);
        assert_eq!(parse_command("REQUEST"), None);
    }

    #[test]
    fn ignores_unknown_verbs_and_empty_lines() {
        assert_eq!(parse_command("HELLO"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("request 500"), None, "verbs are case-sensitive");
    }
}
