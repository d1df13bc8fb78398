//! Debounced autosave actor.
//!
//! Edits are sent to a single background task over an
//! [`mpsc`](tokio::sync::mpsc) channel. The task keeps only the latest
//! snapshot per key and writes them all once the debounce window that
//! opened with the first pending save has elapsed, on [`Autosave::flush`],
//! or when the handle shuts down.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{error, trace};

use super::{NotebookStore, StorageError};
use crate::locator::StorageKey;
use crate::notebook::Notebook;

/// Capacity of the autosave channel.
const AUTOSAVE_CHANNEL_CAPACITY: usize = 64;

/// Messages accepted by the autosave actor.
#[derive(Debug)]
pub enum SaveOp {
    /// Queue a snapshot, replacing any pending snapshot for the same key.
    Schedule {
        /// Storage key.
        key: StorageKey,
        /// Latest notebook state.
        notebook: Box<Notebook>,
    },
    /// Write everything pending now and acknowledge.
    Flush(oneshot::Sender<()>),
}

/// Handle to the autosave actor.
#[derive(Debug)]
pub struct Autosave {
    tx: mpsc::Sender<SaveOp>,
    handle: tokio::task::JoinHandle<()>,
}

impl Autosave {
    /// Spawn the actor writing into `store` after `debounce`.
    pub fn spawn(store: NotebookStore, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::channel(AUTOSAVE_CHANNEL_CAPACITY);
        let handle = tokio::spawn(run_autosave(store, debounce, rx));
        Self { tx, handle }
    }

    /// Queue a snapshot of `notebook` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::WriterClosed`] if the actor has stopped.
    pub async fn schedule(&self, key: StorageKey, notebook: Notebook) -> Result<(), StorageError> {
        self.tx
            .send(SaveOp::Schedule {
                key,
                notebook: Box::new(notebook),
            })
            .await
            .map_err(|_| StorageError::WriterClosed)
    }

    /// Write all pending snapshots and wait for completion.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::WriterClosed`] if the actor has stopped.
    pub async fn flush(&self) -> Result<(), StorageError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(SaveOp::Flush(ack_tx))
            .await
            .map_err(|_| StorageError::WriterClosed)?;
        ack_rx.await.map_err(|_| StorageError::WriterClosed)
    }

    /// Drop the channel and wait for the actor to write what is pending.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.handle.await;
    }
}

/// Run the autosave loop until every sender is dropped.
pub async fn run_autosave(
    store: NotebookStore,
    debounce: Duration,
    mut rx: mpsc::Receiver<SaveOp>,
) {
    let mut pending: HashMap<StorageKey, Notebook> = HashMap::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let op = match deadline {
            Some(at) => match tokio::time::timeout_at(at, rx.recv()).await {
                Ok(op) => op,
                Err(_) => {
                    write_pending(&store, &mut pending).await;
                    deadline = None;
                    continue;
                }
            },
            None => rx.recv().await,
        };

        match op {
            Some(SaveOp::Schedule { key, notebook }) => {
                trace!(key = %key, "autosave scheduled");
                pending.insert(key, *notebook);
                if deadline.is_none() {
                    let now = Instant::now();
                    deadline = Some(now.checked_add(debounce).unwrap_or(now));
                }
            }
            Some(SaveOp::Flush(ack)) => {
                write_pending(&store, &mut pending).await;
                deadline = None;
                let _ = ack.send(());
            }
            None => {
                write_pending(&store, &mut pending).await;
                break;
            }
        }
    }
    trace!("autosave writer stopped");
}

async fn write_pending(store: &NotebookStore, pending: &mut HashMap<StorageKey, Notebook>) {
    for (key, notebook) in pending.drain() {
        if let Err(err) = store.save(&key, &notebook).await {
            error!(key = %key, error = %err, "autosave write failed");
        }
    }
}
