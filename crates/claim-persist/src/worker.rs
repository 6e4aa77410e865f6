//! Background writer that keeps LMDB writes off the engine's lock.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use claim_engine::{ActorId, ClaimStore, LedgerEntry, Region, RegionId};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, warn};

use crate::{ClaimDb, PersistError, PersistOp, PersistResult};

enum Message {
    Op(PersistOp),
    /// Acknowledged once everything queued before it is committed.
    Flush(Sender<()>),
}

/// [`ClaimStore`] that queues every change to a dedicated writer thread.
///
/// Queued operations are drained in batches and committed one transaction
/// per batch. Dropping the worker commits whatever is still queued.
pub struct PersistWorker {
    tx: Option<Sender<Message>>,
    handle: Option<JoinHandle<()>>,
}

impl PersistWorker {
    pub fn spawn(db: Arc<ClaimDb>) -> PersistResult<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("claim-persist".to_owned())
            .spawn(move || writer_loop(&db, &rx))?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    fn send(&self, op: PersistOp) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(Message::Op(op)).is_err() {
            warn!("persistence worker is gone, dropping write");
        }
    }

    /// Block until every operation queued so far is on disk.
    pub fn flush(&self) -> PersistResult<()> {
        let tx = self.tx.as_ref().ok_or(PersistError::WorkerClosed)?;
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        tx.send(Message::Flush(ack_tx))
            .map_err(|_| PersistError::WorkerClosed)?;
        ack_rx.recv().map_err(|_| PersistError::WorkerClosed)
    }
}

impl ClaimStore for PersistWorker {
    fn region_saved(&self, region: &Region) {
        self.send(PersistOp::SaveRegion(region.clone()));
    }

    fn region_removed(&self, id: RegionId) {
        self.send(PersistOp::RemoveRegion(id));
    }

    fn ledger_saved(&self, actor: ActorId, entry: &LedgerEntry) {
        self.send(PersistOp::SaveLedger(actor, entry.clone()));
    }
}

impl Drop for PersistWorker {
    fn drop(&mut self) {
        // Closing the channel ends the writer loop after it drains.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("persistence writer panicked");
            }
        }
    }
}

fn writer_loop(db: &ClaimDb, rx: &Receiver<Message>) {
    let mut batch = Vec::new();
    let mut acks = Vec::new();

    while let Ok(first) = rx.recv() {
        for message in std::iter::once(first).chain(rx.try_iter()) {
            match message {
                Message::Op(op) => batch.push(op),
                Message::Flush(ack) => acks.push(ack),
            }
        }

        if !batch.is_empty() {
            if let Err(e) = db.apply(&batch) {
                error!("failed to persist {} claim changes: {e}", batch.len());
            }
            batch.clear();
        }
        for ack in acks.drain(..) {
            let _ = ack.send(());
        }
    }

    debug!("persistence writer stopped");
}
