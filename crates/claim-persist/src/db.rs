//! LMDB database holding regions and ledger rows.

use std::path::Path;

use claim_engine::{ActorId, LedgerEntry, Region, RegionId};
use heed::{Database, Env, EnvOpenOptions, RwTxn, types::Bytes};
use tracing::trace;
use uuid::Uuid;

use crate::{PersistError, PersistResult};

/// One pending write.
#[derive(Clone, Debug)]
pub enum PersistOp {
    SaveRegion(Region),
    RemoveRegion(RegionId),
    SaveLedger(ActorId, LedgerEntry),
}

/// Everything needed to rebuild a [`claim_engine::ClaimEngine`].
#[derive(Debug, Default)]
pub struct Snapshot {
    pub regions: Vec<Region>,
    pub ledger: Vec<(ActorId, LedgerEntry)>,
}

/// LMDB wrapper with one table for regions and one for the block ledger.
///
/// Region keys are the big-endian region id, so iteration yields regions
/// in creation order. Ledger keys are the actor's hyphenated uuid.
pub struct ClaimDb {
    env: Env,
    regions: Database<Bytes, Bytes>,
    ledger: Database<Bytes, Bytes>,
}

impl ClaimDb {
    /// Open or create the database directory at `path`.
    ///
    /// # Safety
    /// heed requires that an environment is not opened twice in one process
    /// with different options.
    #[allow(unsafe_code)]
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        // SAFETY: the runner opens the data directory exactly once.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(1024 * 1024 * 1024) // 1GB max
                .max_dbs(2)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let regions = env.create_database(&mut wtxn, Some("regions"))?;
        let ledger = env.create_database(&mut wtxn, Some("ledger"))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            regions,
            ledger,
        })
    }

    pub fn put_region(&self, region: &Region) -> PersistResult<()> {
        let bytes = bincode::serialize(region)?;
        let mut wtxn = self.env.write_txn()?;
        self.regions.put(&mut wtxn, &region_key(region.id()), &bytes)?;
        wtxn.commit()?;
        Ok(())
    }

    /// Returns whether the region was present.
    pub fn delete_region(&self, id: RegionId) -> PersistResult<bool> {
        let mut wtxn = self.env.write_txn()?;
        let deleted = self.regions.delete(&mut wtxn, &region_key(id))?;
        wtxn.commit()?;
        Ok(deleted)
    }

    pub fn put_ledger(&self, actor: ActorId, entry: &LedgerEntry) -> PersistResult<()> {
        let bytes = bincode::serialize(entry)?;
        let mut wtxn = self.env.write_txn()?;
        self.ledger.put(&mut wtxn, ledger_key(actor).as_bytes(), &bytes)?;
        wtxn.commit()?;
        Ok(())
    }

    /// Write a batch of operations in a single transaction.
    pub fn apply(&self, ops: &[PersistOp]) -> PersistResult<()> {
        let mut wtxn = self.env.write_txn()?;
        for op in ops {
            self.apply_one(&mut wtxn, op)?;
        }
        wtxn.commit()?;
        trace!("committed {} persistence ops", ops.len());
        Ok(())
    }

    fn apply_one(&self, wtxn: &mut RwTxn<'_>, op: &PersistOp) -> PersistResult<()> {
        match op {
            PersistOp::SaveRegion(region) => {
                let bytes = bincode::serialize(region)?;
                self.regions.put(wtxn, &region_key(region.id()), &bytes)?;
            }
            PersistOp::RemoveRegion(id) => {
                self.regions.delete(wtxn, &region_key(*id))?;
            }
            PersistOp::SaveLedger(actor, entry) => {
                let bytes = bincode::serialize(entry)?;
                self.ledger.put(wtxn, ledger_key(*actor).as_bytes(), &bytes)?;
            }
        }
        Ok(())
    }

    /// Read every stored region and ledger row.
    pub fn load_all(&self) -> PersistResult<Snapshot> {
        let rtxn = self.env.read_txn()?;
        let mut snapshot = Snapshot::default();

        for row in self.regions.iter(&rtxn)? {
            let (_, bytes) = row?;
            snapshot.regions.push(bincode::deserialize(bytes)?);
        }

        for row in self.ledger.iter(&rtxn)? {
            let (key, bytes) = row?;
            let key = String::from_utf8_lossy(key);
            let uuid =
                Uuid::parse_str(&key).map_err(|_| PersistError::MalformedKey(key.to_string()))?;
            snapshot
                .ledger
                .push((ActorId::from_uuid(uuid), bincode::deserialize(bytes)?));
        }

        trace!(
            "loaded {} regions and {} ledger rows",
            snapshot.regions.len(),
            snapshot.ledger.len()
        );
        Ok(snapshot)
    }
}

const fn region_key(id: RegionId) -> [u8; 8] {
    id.as_raw().to_be_bytes()
}

fn ledger_key(actor: ActorId) -> String {
    actor.uuid().hyphenated().to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use claim_engine::prelude::*;
    use claim_engine::CapabilityTable;

    use super::*;

    const ALICE: ActorId = ActorId::from_u128(0x550e8400_e29b_41d4_a716_446655440000);

    /// Build a real region through the engine so the test never depends on
    /// crate-private constructors.
    fn sample_region() -> Region {
        let engine = ClaimEngine::new(ClaimConfig::default(), Arc::new(CapabilityTable::new()));
        let id = engine
            .create_region(
                ALICE,
                NewRegion {
                    world: WorldId::new("world"),
                    bounds: Bounds::from_corners(BlockPos::new(0, 60, 0), BlockPos::new(9, 80, 9)),
                    kind: RegionKind::Claim,
                },
                0,
            )
            .unwrap();
        engine.region(id).unwrap()
    }

    #[test]
    fn test_region_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = ClaimDb::open(dir.path()).unwrap();
        let region = sample_region();

        db.put_region(&region).unwrap();
        let snapshot = db.load_all().unwrap();

        assert_eq!(snapshot.regions.len(), 1);
        assert_eq!(snapshot.regions[0].id(), region.id());
        assert_eq!(snapshot.regions[0].bounds(), region.bounds());
        assert_eq!(snapshot.regions[0].owner(), Some(ALICE));
    }

    #[test]
    fn test_delete_region() {
        let dir = tempfile::tempdir().unwrap();
        let db = ClaimDb::open(dir.path()).unwrap();
        let region = sample_region();

        db.put_region(&region).unwrap();
        assert!(db.delete_region(region.id()).unwrap());
        assert!(!db.delete_region(region.id()).unwrap());
        assert!(db.load_all().unwrap().regions.is_empty());
    }

    #[test]
    fn test_ledger_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db = ClaimDb::open(dir.path()).unwrap();
        let entry = LedgerEntry {
            accrued: 120,
            bonus: 30,
            spent: 100,
            last_active: Some(42),
        };

        db.put_ledger(ALICE, &entry).unwrap();
        let snapshot = db.load_all().unwrap();

        assert_eq!(snapshot.ledger, vec![(ALICE, entry)]);
    }

    #[test]
    fn test_batch_is_applied_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = ClaimDb::open(dir.path()).unwrap();
        let region = sample_region();

        db.apply(&[
            PersistOp::SaveRegion(region.clone()),
            PersistOp::RemoveRegion(region.id()),
        ])
        .unwrap();

        assert!(db.load_all().unwrap().regions.is_empty());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let region = sample_region();
        {
            let db = ClaimDb::open(dir.path()).unwrap();
            db.put_region(&region).unwrap();
        }

        let db = ClaimDb::open(dir.path()).unwrap();
        assert_eq!(db.load_all().unwrap().regions.len(), 1);
    }
}
