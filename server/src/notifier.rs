//! Outbound notification stream, one task per customer.

use std::sync::Arc;

use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use customer::model::{CustomerId, Slot, ToolEvent, ToolEventKind};

use crate::shared::Shared;
use crate::transport::ClientStream;

pub type SharedWriter = Arc<Mutex<WriteHalf<Box<dyn ClientStream>>>>;

/// One outbound event line. Shares render truncated.
pub fn render_event(id: CustomerId, share: f64, event: &ToolEvent) -> String {
    let share = share as u64;
    let tool = event.tool;
    match event.kind {
        ToolEventKind::Assigned => {
            format!("Customer {id} with share {share} is assigned to the tool {tool}.\n")
        }
        ToolEventKind::Evicted => {
            format!("Customer {id} with share {share} is removed from the tool {tool}.\n")
        }
        ToolEventKind::Finished => {
            format!("Customer {id} with share {share} leaves the tool {tool}.\n")
        }
    }
}

/// Wait on the customer's mailbox and write out pending events, one at a
/// time. Exits when the slot has been freed or reused by a later
/// connection, or when the peer stops accepting writes.
pub async fn run(
    shared: Arc<Shared>,
    slot: Slot,
    id: CustomerId,
    mailbox: Arc<Notify>,
    writer: SharedWriter,
) {
    loop {
        let line = {
            let mut state = shared.state.lock().await;
            match state.customers.get_mut(slot) {
                Some(c) if c.id == id => {
                    c.pending.take().map(|ev| render_event(c.id, c.share, &ev))
                }
                _ => break,
            }
        };

        match line {
            Some(text) => {
                let mut w = writer.lock().await;
                if w.write_all(text.as_bytes()).await.is_err() {
                    break;
                }
            }
            None => mailbox.notified().await,
        }
    }
    debug!(customer = id, "notifier stopped");
}
