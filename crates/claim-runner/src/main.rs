//! Console host for the claim engine.
//!
//! This binary:
//! 1. Loads a JSON config from `CLAIMS_CONFIG` (defaults when unset)
//! 2. Restores regions and ledger rows from the LMDB directory `CLAIMS_DATA_DIR`
//! 3. Reads commands from stdin, one per line, acting as any named player
//! 4. Runs the expiration sweep every `CLAIMS_SWEEP_SECS` seconds
//!
//! Type `help` for the command list.

mod command;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use claim_engine::{
    ActorId, Capabilities, CapabilityTable, ClaimConfig, ClaimEngine, ClaimError, ClaimStore,
    CornerOutcome, Grantee, RegionId, TrustList, WorldId,
};
use claim_persist::{ClaimDb, PersistWorker};
use command::{Command, GranteeArg, parse_command, usage};
use hashbrown::HashMap;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Player names map to stable actor ids so claims survive restarts.
fn actor_for(name: &str) -> ActorId {
    ActorId::from_uuid(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

struct Console {
    engine: ClaimEngine,
    capabilities: Arc<CapabilityTable>,
    world: WorldId,
    names: HashMap<ActorId, String>,
}

impl Console {
    fn actor(&mut self, name: &str) -> ActorId {
        let actor = actor_for(name);
        self.names.entry(actor).or_insert_with(|| name.to_owned());
        self.engine.record_activity(actor, now_secs());
        actor
    }

    fn label(&self, actor: Option<ActorId>) -> String {
        match actor {
            Some(actor) => self
                .names
                .get(&actor)
                .cloned()
                .unwrap_or_else(|| actor.to_string()),
            None => "admin".to_owned(),
        }
    }

    fn grantee(&mut self, arg: GranteeArg) -> Grantee {
        match arg {
            GranteeArg::Public => Grantee::Public,
            GranteeArg::Node(node) => Grantee::ExternalNode(node),
            GranteeArg::Player(name) => {
                Grantee::parse(&name).unwrap_or_else(|| Grantee::Player(self.actor(&name)))
            }
        }
    }

    /// Returns false once the console should stop.
    fn run(&mut self, command: Command) -> bool {
        match command {
            Command::Quit => {
                info!("Shutting down...");
                return false;
            }
            Command::Help => {
                info!("Commands:");
                for line in usage() {
                    info!("{line}");
                }
            }
            Command::Unknown(word) => {
                if !word.is_empty() {
                    info!("Unknown command: '{word}'. Type 'help' for commands.");
                }
            }
            Command::Invalid(reason) => warn!("{reason}"),
            Command::Sweep => self.sweep(),
            other => {
                if let Err(e) = self.run_player(other) {
                    warn!("{e}");
                }
            }
        }
        true
    }

    fn sweep(&self) {
        let removed = self.engine.expire_inactive(now_secs());
        info!("sweep removed {} regions", removed.len());
    }

    fn run_player(&mut self, command: Command) -> Result<(), ClaimError> {
        let now = now_secs();
        match command {
            Command::Mode(name, mode) => {
                let actor = self.actor(&name);
                self.engine.begin_region_workflow(actor, mode);
                info!("{name} is now in {mode:?} mode");
            }
            Command::Corner(name, pos) => {
                let actor = self.actor(&name);
                match self.engine.set_corner(actor, &self.world, pos, now)? {
                    CornerOutcome::Pending(target) => {
                        info!("{name} set a corner at {pos} ({target:?}); place the opposite one");
                    }
                    CornerOutcome::Committed(id) => self.describe(id, &name),
                    CornerOutcome::Ignored => info!("{name} clicked the same corner again"),
                }
            }
            Command::Cancel(name) => {
                let actor = self.actor(&name);
                self.engine.cancel_workflow(actor)?;
                info!("{name} cancelled the pending corner");
            }
            Command::Claim {
                player,
                center,
                radius,
            } => {
                let actor = self.actor(&player);
                let id = self
                    .engine
                    .create_claim_around(actor, &self.world, center, radius, now)?;
                self.describe(id, &player);
            }
            Command::Extend {
                player,
                region,
                direction,
                amount,
            } => {
                let actor = self.actor(&player);
                self.engine.extend_region(actor, region, direction, amount)?;
                self.describe(region, &player);
            }
            Command::Trust {
                player,
                region,
                tier,
                grantee,
            } => {
                let actor = self.actor(&player);
                let grantee = self.grantee(grantee);
                match region {
                    Some(id) => {
                        self.engine.set_permission(actor, id, tier, grantee.clone())?;
                        info!("{player} granted {tier} on {id} to {grantee}");
                    }
                    None => {
                        let count = self
                            .engine
                            .set_permission_on_all_owned(actor, tier, &grantee)?;
                        info!("{player} granted {tier} to {grantee} on {count} claims");
                    }
                }
            }
            Command::Untrust {
                player,
                region,
                grantee,
            } => {
                let actor = self.actor(&player);
                let grantee = self.grantee(grantee);
                if self.engine.remove_permission(actor, region, &grantee)? {
                    info!("{player} revoked {grantee} on {region}");
                } else {
                    info!("{grantee} had no grant on {region}");
                }
            }
            Command::TrustList(name, region) => {
                let actor = self.actor(&name);
                let list = self.engine.trust_list(actor, region)?;
                log_trust_list(region, &list);
            }
            Command::Check { player, tier, pos } => {
                let actor = self.actor(&player);
                let mut hint = None;
                match self
                    .engine
                    .check_action(actor, &self.world, pos, tier, &mut hint)
                {
                    Ok(()) => info!("{player} may {tier} at {pos}"),
                    Err(denial) => info!("{player} may not {tier} at {pos}: {denial}"),
                }
            }
            Command::Blocks(name) => {
                let actor = self.actor(&name);
                let entry = self.engine.ledger_entry(actor);
                info!(
                    "{name}: {} accrued, {} bonus, {} in use, {} remaining",
                    entry.accrued,
                    entry.bonus,
                    entry.spent,
                    self.engine.remaining_blocks(actor)
                );
            }
            Command::Bonus(name, delta) => {
                let actor = self.actor(&name);
                let bonus = self.engine.adjust_bonus_blocks(actor, delta);
                info!("{name} now has {bonus} bonus blocks");
            }
            Command::Accrue(name, delta) => {
                let actor = self.actor(&name);
                let accrued = self.engine.accrue_blocks(actor, delta);
                info!("{name} now has {accrued} accrued blocks");
            }
            Command::Abandon(name, region) => {
                let actor = self.actor(&name);
                let removed = self.engine.delete_region(actor, region)?;
                info!("{name} removed {} regions", removed.len());
            }
            Command::AbandonAll(name) => {
                let actor = self.actor(&name);
                let removed = self.engine.abandon_all(actor)?;
                info!("{name} abandoned {} regions", removed.len());
            }
            Command::Transfer {
                player,
                region,
                to,
            } => {
                let actor = self.actor(&player);
                let new_owner = to.as_deref().map(|name| self.actor(name));
                self.engine.transfer_owner(actor, region, new_owner)?;
                info!("{region} now belongs to {}", self.label(new_owner));
            }
            Command::Explosions(name, region, allow) => {
                let actor = self.actor(&name);
                self.engine.set_allow_explosions(actor, region, allow)?;
                info!("explosions on {region}: {}", if allow { "on" } else { "off" });
            }
            Command::RestrictSubclaim(name, region, restrict) => {
                let actor = self.actor(&name);
                self.engine.set_subclaim_restriction(actor, region, restrict)?;
                info!("{region} inherits parent grants: {}", !restrict);
            }
            Command::UntrustAll(name, region) => {
                let actor = self.actor(&name);
                self.engine.clear_permissions(actor, region)?;
                info!("{name} cleared every grant on {region}");
            }
            Command::DeleteAll(name, owner) => {
                let actor = self.actor(&name);
                let owner = owner.as_deref().map(|owner| self.actor(owner));
                let removed = self.engine.delete_all_of(actor, owner)?;
                info!("{name} deleted {} regions of {}", removed.len(), self.label(owner));
            }
            Command::DeleteWorld {
                player,
                world,
                include_admin,
            } => {
                let actor = self.actor(&player);
                let removed = self.engine.delete_claims_in_world(
                    actor,
                    &WorldId::new(world.as_str()),
                    include_admin,
                )?;
                info!("{player} deleted {} regions in {world}", removed.len());
            }
            Command::BonusAll(delta) => {
                let count = self.engine.adjust_bonus_blocks_all(delta);
                info!("adjusted bonus blocks of {count} players by {delta}");
            }
            Command::List(name) => {
                let actor = self.actor(&name);
                let owned = self.engine.regions_owned_by(actor);
                info!(
                    "{name} owns {} claims, {} blocks remaining",
                    owned.len(),
                    self.engine.remaining_blocks(actor)
                );
                for id in owned {
                    self.describe(id, &name);
                }
            }
            Command::Op(name, capability) => {
                let actor = self.actor(&name);
                self.capabilities.grant(actor, capability);
                info!("{name} now has {capability:?}");
            }
            Command::Sweep
            | Command::Help
            | Command::Quit
            | Command::Unknown(_)
            | Command::Invalid(_) => {}
        }
        Ok(())
    }

    fn describe(&self, id: RegionId, viewer: &str) {
        let Some(region) = self.engine.region(id) else {
            return;
        };
        let bounds = region.bounds();
        info!(
            "{viewer}: {id} owned by {} spans {} to {} ({} blocks, {} subdivisions)",
            self.label(region.owner()),
            bounds.min(),
            bounds.max(),
            region.area(),
            region.children().len()
        );
    }
}

fn log_trust_list(region: RegionId, list: &TrustList) {
    let join = |grantees: &[Grantee]| {
        grantees
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    info!("trust on {region}:");
    info!("  manage:    {}", join(&list.managers));
    info!("  build:     {}", join(&list.build));
    info!("  inventory: {}", join(&list.inventory));
    info!("  access:    {}", join(&list.access));
    if list.inherits_parent {
        info!("  (parent grants also apply)");
    }
}

fn load_config() -> eyre::Result<ClaimConfig> {
    let Ok(path) = std::env::var("CLAIMS_CONFIG") else {
        info!("CLAIMS_CONFIG unset, using defaults");
        return Ok(ClaimConfig::default());
    };
    let json = std::fs::read_to_string(&path)?;
    let config = ClaimConfig::from_json_str(&json)?;
    info!("Loaded config from {path}");
    Ok(config)
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("claim_runner=info".parse()?)
                .add_directive("claim_engine=info".parse()?)
                .add_directive("claim_persist=info".parse()?),
        )
        .init();

    info!("Starting claim console");

    let config = load_config()?;

    let data_dir = std::env::var("CLAIMS_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/claims"));
    let world = std::env::var("CLAIMS_WORLD").unwrap_or_else(|_| "world".to_owned());
    let sweep_secs: u64 = std::env::var("CLAIMS_SWEEP_SECS")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(300);

    info!("Data directory: {}", data_dir.display());

    let db = Arc::new(ClaimDb::open(&data_dir)?);
    let snapshot = db.load_all()?;
    let worker = Arc::new(PersistWorker::spawn(Arc::clone(&db))?);

    let capabilities = Arc::new(CapabilityTable::new());
    let engine = ClaimEngine::new(config, Arc::clone(&capabilities) as Arc<dyn Capabilities>)
        .with_store(Arc::clone(&worker) as Arc<dyn ClaimStore>);
    let restored = engine.restore(snapshot.regions, snapshot.ledger)?;
    info!("Restored {restored} regions");

    let mut console = Console {
        engine,
        capabilities,
        world: WorldId::new(world),
        names: HashMap::new(),
    };

    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
    thread::spawn(move || input_thread(&cmd_tx));

    info!("Type 'help' for commands");

    let sweep_every = Duration::from_secs(sweep_secs.max(1));
    loop {
        match cmd_rx.recv_timeout(sweep_every) {
            Ok(command) => {
                if !console.run(command) {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => console.sweep(),
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Err(e) = worker.flush() {
        error!("Failed to flush claim changes: {e}");
    }

    Ok(())
}

fn input_thread(tx: &mpsc::Sender<Command>) {
    for line in io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        let cmd = parse_command(&line);
        let is_quit = matches!(cmd, Command::Quit);
        if tx.send(cmd).is_err() || is_quit {
            return;
        }
    }
    let _ = tx.send(Command::Quit);
}

#[cfg(test)]
mod tests {
    use claim_engine::{BlockPos, TrustTier};

    use super::*;

    fn console() -> Console {
        let capabilities = Arc::new(CapabilityTable::new());
        let config = ClaimConfig {
            initial_blocks: 500,
            ..ClaimConfig::default()
        };
        Console {
            engine: ClaimEngine::new(config, Arc::clone(&capabilities) as Arc<dyn Capabilities>),
            capabilities,
            world: WorldId::new("world"),
            names: HashMap::new(),
        }
    }

    #[test]
    fn test_names_map_to_stable_actors() {
        assert_eq!(actor_for("alice"), actor_for("alice"));
        assert_ne!(actor_for("alice"), actor_for("bob"));
    }

    #[test]
    fn test_console_claim_and_trust() {
        let mut console = console();
        assert!(console.run(parse_command("claim alice 0 70 0")));
        let alice = actor_for("alice");
        let bob = actor_for("bob");
        let id = console.engine.regions_owned_by(alice)[0];

        let mut hint = None;
        let pos = BlockPos::new(0, 70, 0);
        let world = console.world.clone();
        assert!(console
            .engine
            .check_action(bob, &world, pos, TrustTier::Build, &mut hint)
            .is_err());

        console.run(parse_command(&format!("trust alice {} build bob", id.as_raw())));
        assert!(console
            .engine
            .check_action(bob, &world, pos, TrustTier::Build, &mut hint)
            .is_ok());
        assert_eq!(console.label(Some(alice)), "alice");
    }

    #[test]
    fn test_console_transfer_needs_admin() {
        let mut console = console();
        console.run(parse_command("claim alice 0 70 0"));
        let id = console.engine.regions_owned_by(actor_for("alice"))[0];

        console.run(parse_command(&format!("transfer alice {} admin", id.as_raw())));
        assert_eq!(console.engine.region(id).unwrap().owner(), Some(actor_for("alice")));

        console.run(parse_command("op alice adminclaims"));
        console.run(parse_command(&format!("transfer alice {} admin", id.as_raw())));
        assert_eq!(console.engine.region(id).unwrap().owner(), None);
        assert_eq!(console.engine.remaining_blocks(actor_for("alice")), 500);
    }

    #[test]
    fn test_console_admin_commands() {
        let mut console = console();
        console.run(parse_command("claim alice 0 70 0"));
        console.run(parse_command("claim bob 100 70 100"));

        // Without the capability nothing is deleted.
        console.run(parse_command("deleteall root alice"));
        assert_eq!(console.engine.regions_owned_by(actor_for("alice")).len(), 1);

        console.run(parse_command("op root deleteclaims"));
        console.run(parse_command("deleteall root alice"));
        assert!(console.engine.regions_owned_by(actor_for("alice")).is_empty());

        console.run(parse_command("deleteworld root world"));
        assert!(console.engine.regions_owned_by(actor_for("bob")).is_empty());

        console.run(parse_command("bonusall 40"));
        assert_eq!(console.engine.remaining_blocks(actor_for("bob")), 540);
    }

    #[test]
    fn test_console_quit() {
        let mut console = console();
        assert!(!console.run(Command::Quit));
        assert!(console.run(Command::Unknown(String::new())));
    }
}
