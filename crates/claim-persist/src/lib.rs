//! LMDB persistence for the claim engine.
//!
//! [`ClaimDb`] stores regions and block-ledger rows with bincode. At startup
//! the host loads a [`Snapshot`] and hands it to
//! [`claim_engine::ClaimEngine::restore`]; afterwards a [`PersistWorker`]
//! attached with `with_store` mirrors every change to disk from its own
//! thread.
//!
//! ```ignore
//! let db = Arc::new(ClaimDb::open("data/claims")?);
//! let snapshot = db.load_all()?;
//! let worker = Arc::new(PersistWorker::spawn(Arc::clone(&db))?);
//! let engine = ClaimEngine::new(config, caps).with_store(worker);
//! engine.restore(snapshot.regions, snapshot.ledger)?;
//! ```

mod db;
mod error;
mod worker;

pub use db::{ClaimDb, PersistOp, Snapshot};
pub use error::{PersistError, PersistResult};
pub use worker::PersistWorker;
