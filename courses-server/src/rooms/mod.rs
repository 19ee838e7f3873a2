//! Per-list broadcast rooms
//!
//! A room is an ephemeral multiplexing construct, created lazily when the
//! first connection subscribes to a list and destroyed when the last one
//! leaves. Nothing about it is persisted; list and item state lives in
//! storage.
//!
//! One task owns each room's command queue and applies commands strictly in
//! arrival order, so two commands on the same list can never interleave
//! their storage read-modify-write. Commands on different lists run fully
//! independently. Broadcast delivery order equals application order.

mod command;

pub use command::ClientCommand;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sqlx::SqlitePool;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, warn};

use courses_common::db::queries;
use courses_common::events::ListEvent;
use courses_common::{Error, Result};

use crate::services::item_service::{self, ItemUpdate};
use crate::services::section_assigner::SectionAssigner;

/// Buffered events per room before slow subscribers start lagging
const EVENT_BUFFER: usize = 100;
/// Pending commands per room before enqueueing applies backpressure
const COMMAND_BUFFER: usize = 32;

/// Outcome reported to the connection that issued a command
#[derive(Debug)]
pub enum CommandOutcome {
    /// Applied; the resulting event was broadcast to the room
    Applied,
    /// Target list or item no longer exists; silently ignored
    Ignored,
    /// Validation failed; the message goes back to the sender only
    Rejected(String),
}

struct QueuedCommand {
    command: ClientCommand,
    reply: oneshot::Sender<CommandOutcome>,
}

struct RoomHandle {
    cmd_tx: mpsc::Sender<QueuedCommand>,
    event_tx: broadcast::Sender<ListEvent>,
    subscribers: usize,
}

/// Owns every active room, keyed by list id
pub struct RoomRegistry {
    db: SqlitePool,
    assigner: Arc<SectionAssigner>,
    rooms: Mutex<HashMap<String, RoomHandle>>,
}

impl RoomRegistry {
    pub fn new(db: SqlitePool, assigner: Arc<SectionAssigner>) -> Arc<Self> {
        Arc::new(Self {
            db,
            assigner,
            rooms: Mutex::new(HashMap::new()),
        })
    }

    /// Join the room for a list, creating it on first subscribe. The caller
    /// must have verified that the list exists.
    pub fn subscribe(self: &Arc<Self>, list_id: &str) -> RoomSubscription {
        let mut rooms = self.rooms.lock().expect("room registry poisoned");
        let handle = rooms.entry(list_id.to_string()).or_insert_with(|| {
            let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
            let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
            tokio::spawn(run_room(
                list_id.to_string(),
                cmd_rx,
                event_tx.clone(),
                self.db.clone(),
                Arc::clone(&self.assigner),
            ));
            debug!(list_id = %list_id, "room created");
            RoomHandle {
                cmd_tx,
                event_tx,
                subscribers: 0,
            }
        });
        handle.subscribers += 1;
        RoomSubscription {
            list_id: list_id.to_string(),
            cmd_tx: handle.cmd_tx.clone(),
            event_rx: handle.event_tx.subscribe(),
            registry: Arc::clone(self),
        }
    }

    fn leave(&self, list_id: &str) {
        let mut rooms = self.rooms.lock().expect("room registry poisoned");
        if let Some(handle) = rooms.get_mut(list_id) {
            handle.subscribers -= 1;
            if handle.subscribers == 0 {
                // dropping the handle releases the last command sender once
                // the departing subscription is gone; the room task then
                // drains its queue and exits
                rooms.remove(list_id);
                debug!(list_id = %list_id, "room destroyed");
            }
        }
    }

    /// Number of currently active rooms
    pub fn room_count(&self) -> usize {
        self.rooms.lock().expect("room registry poisoned").len()
    }
}

/// One connection's membership in a room. Dropping it leaves the room.
pub struct RoomSubscription {
    list_id: String,
    cmd_tx: mpsc::Sender<QueuedCommand>,
    event_rx: broadcast::Receiver<ListEvent>,
    registry: Arc<RoomRegistry>,
}

impl RoomSubscription {
    /// Enqueue a command and wait until the room task has applied it.
    ///
    /// The mutation is owned by the room task: dropping this subscription
    /// while a command is in flight does not cancel the mutation or its
    /// broadcast.
    pub async fn send_command(&self, command: ClientCommand) -> CommandOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        let queued = QueuedCommand {
            command,
            reply: reply_tx,
        };
        if self.cmd_tx.send(queued).await.is_err() {
            return CommandOutcome::Rejected("Erreur interne.".to_string());
        }
        match reply_rx.await {
            Ok(outcome) => outcome,
            Err(_) => CommandOutcome::Rejected("Erreur interne.".to_string()),
        }
    }

    /// Next broadcast event for this room; `None` once the room is gone.
    /// A lagging receiver skips the missed events and keeps going.
    pub async fn next_event(&mut self) -> Option<ListEvent> {
        loop {
            match self.event_rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(
                        list_id = %self.list_id,
                        missed,
                        "subscriber lagged behind room broadcasts"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn list_id(&self) -> &str {
        &self.list_id
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        self.registry.leave(&self.list_id);
    }
}

/// Single consumer of one room's command queue. Runs until every sender
/// (the handle in the registry plus all subscriptions) is gone, finishing
/// any queued commands first.
async fn run_room(
    list_id: String,
    mut cmd_rx: mpsc::Receiver<QueuedCommand>,
    event_tx: broadcast::Sender<ListEvent>,
    db: SqlitePool,
    assigner: Arc<SectionAssigner>,
) {
    debug!(list_id = %list_id, "room task started");
    while let Some(queued) = cmd_rx.recv().await {
        let outcome = match apply_command(&db, &assigner, &list_id, queued.command).await {
            Ok(Some(event)) => {
                // no receivers is fine (everyone may have just left)
                let _ = event_tx.send(event);
                CommandOutcome::Applied
            }
            Ok(None) => CommandOutcome::Ignored,
            Err(Error::InvalidInput(message)) => CommandOutcome::Rejected(message),
            Err(e) => {
                // one failing command must not take the room down
                error!(list_id = %list_id, error = %e, "command application failed");
                CommandOutcome::Rejected("Erreur interne.".to_string())
            }
        };
        // the issuing connection may already be gone
        let _ = queued.reply.send(outcome);
    }
    debug!(list_id = %list_id, "room task finished");
}

/// Validate and apply one command against storage. `Ok(Some)` carries the
/// event to broadcast; `Ok(None)` means the target vanished (silent no-op).
async fn apply_command(
    db: &SqlitePool,
    assigner: &SectionAssigner,
    list_id: &str,
    command: ClientCommand,
) -> Result<Option<ListEvent>> {
    let Some(list) = queries::get_list(db, list_id).await? else {
        return Ok(None);
    };

    match command {
        ClientCommand::AddItem {
            name,
            quantity,
            notes,
            section_slug,
        } => {
            let item = item_service::create_item(
                db,
                assigner,
                &list,
                &name,
                &quantity,
                &notes,
                section_slug.as_deref(),
            )
            .await?;
            Ok(Some(ListEvent::ItemAdded { item }))
        }
        ClientCommand::UpdateItem {
            item_id,
            name,
            quantity,
            notes,
            checked,
            position,
            section_id,
        } => {
            let update = ItemUpdate {
                name,
                quantity,
                notes,
                checked,
                position,
                section_id,
            };
            let updated = item_service::update_item(db, &list.id, &item_id, update).await?;
            Ok(updated.map(|item| ListEvent::ItemUpdated { item }))
        }
        ClientCommand::DeleteItem { item_id } => {
            let deleted = queries::delete_item(db, &list.id, &item_id).await?;
            Ok(deleted.then_some(ListEvent::ItemDeleted { item_id }))
        }
        ClientCommand::CheckItem { item_id, checked } => {
            let update = ItemUpdate {
                checked: Some(checked),
                ..Default::default()
            };
            let updated = item_service::update_item(db, &list.id, &item_id, update).await?;
            Ok(updated.map(|item| ListEvent::ItemUpdated { item }))
        }
        ClientCommand::ReorderItems {
            section_order,
            item_orders,
        } => {
            let detail = item_service::apply_reorder(
                db,
                &list,
                section_order.as_deref(),
                item_orders.as_deref(),
            )
            .await?;
            Ok(Some(ListEvent::ListUpdated { list: detail }))
        }
    }
}
