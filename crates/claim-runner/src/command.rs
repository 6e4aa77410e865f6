//! Console command parsing.

use claim_engine::{BlockPos, Capability, Direction, RegionId, ShovelMode, TrustTier};

/// A player argument, resolved to an actor by the runner.
pub type Name = String;

/// Target of a trust command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GranteeArg {
    Public,
    Node(String),
    Player(Name),
}

/// Commands sent from the input thread.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Mode(Name, ShovelMode),
    Corner(Name, BlockPos),
    Cancel(Name),
    Claim {
        player: Name,
        center: BlockPos,
        radius: Option<i32>,
    },
    Extend {
        player: Name,
        region: RegionId,
        direction: Direction,
        amount: i32,
    },
    Trust {
        player: Name,
        region: Option<RegionId>,
        tier: TrustTier,
        grantee: GranteeArg,
    },
    Untrust {
        player: Name,
        region: RegionId,
        grantee: GranteeArg,
    },
    TrustList(Name, RegionId),
    Check {
        player: Name,
        tier: TrustTier,
        pos: BlockPos,
    },
    Blocks(Name),
    Bonus(Name, i64),
    Accrue(Name, i64),
    Abandon(Name, RegionId),
    AbandonAll(Name),
    Transfer {
        player: Name,
        region: RegionId,
        /// `None` makes the region administrative.
        to: Option<Name>,
    },
    Explosions(Name, RegionId, bool),
    RestrictSubclaim(Name, RegionId, bool),
    UntrustAll(Name, RegionId),
    /// `None` targets administrative regions.
    DeleteAll(Name, Option<Name>),
    DeleteWorld {
        player: Name,
        world: String,
        include_admin: bool,
    },
    BonusAll(i64),
    List(Name),
    Op(Name, Capability),
    Sweep,
    Help,
    Quit,
    Unknown(String),
    Invalid(String),
}

const USAGE: &[(&str, &str)] = &[
    ("mode <player> basic|admin|subdivide", "switch shovel mode"),
    ("corner <player> <x> <y> <z>", "place a shovel corner"),
    ("cancel <player>", "drop a pending corner"),
    ("claim <player> <x> <y> <z> [radius]", "claim a square around a point"),
    ("extend <player> <region> <n|s|e|w|d> <amount>", "grow a claim"),
    ("trust <player> <region|all> <tier> <grantee>", "grant a tier"),
    ("untrust <player> <region> <grantee>", "revoke a grant"),
    ("trustlist <player> <region>", "show grants"),
    ("check <player> <tier> <x> <y> <z>", "test an action"),
    ("blocks <player>", "show the block ledger"),
    ("bonus <player> <delta>", "adjust bonus blocks"),
    ("accrue <player> <delta>", "add accrued blocks"),
    ("abandon <player> <region>", "delete a region"),
    ("abandonall <player>", "delete every owned claim"),
    ("transfer <player> <region> <player|admin>", "change owner"),
    ("explosions <player> <region> on|off", "toggle explosions"),
    ("restrictsubclaim <player> <region> on|off", "stop parent grants applying"),
    ("untrustall <player> <region>", "clear every grant"),
    ("deleteall <player> <player|admin>", "delete every claim of an owner"),
    ("deleteworld <player> <world> [admin]", "delete every claim in a world"),
    ("bonusall <delta>", "adjust bonus blocks of every player"),
    ("list <player>", "list owned claims"),
    ("op <player> <capability>", "grant a capability"),
    ("sweep", "run the expiration sweep"),
    ("q, quit", "quit"),
];

/// Lines describing every command.
pub fn usage() -> impl Iterator<Item = String> {
    USAGE
        .iter()
        .map(|(syntax, what)| format!("  {syntax:<48} - {what}"))
}

const COMMAND_WORDS: &[&str] = &[
    "mode", "corner", "cancel", "claim", "extend", "trust", "untrust", "trustlist", "check",
    "blocks", "bonus", "accrue", "abandon", "abandonall", "transfer", "explosions",
    "restrictsubclaim", "untrustall", "deleteall", "deleteworld", "bonusall", "list", "op", "sweep",
    "help", "h", "?", "quit", "q", "exit",
];

pub fn parse_command(line: &str) -> Command {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&head, args)) = words.split_first() else {
        return Command::Unknown(String::new());
    };
    if !COMMAND_WORDS.contains(&head) {
        return Command::Unknown(head.to_owned());
    }

    parse_args(head, args).unwrap_or_else(|reason| Command::Invalid(format!("{head}: {reason}")))
}

fn parse_args(head: &str, args: &[&str]) -> Result<Command, String> {
    let command = match (head, args) {
        ("mode", [player, mode]) => Command::Mode(name(player), parse_mode(mode)?),
        ("corner", [player, x, y, z]) => Command::Corner(name(player), pos(x, y, z)?),
        ("cancel", [player]) => Command::Cancel(name(player)),
        ("claim", [player, x, y, z]) => Command::Claim {
            player: name(player),
            center: pos(x, y, z)?,
            radius: None,
        },
        ("claim", [player, x, y, z, radius]) => Command::Claim {
            player: name(player),
            center: pos(x, y, z)?,
            radius: Some(number(radius)?),
        },
        ("extend", [player, region, direction, amount]) => Command::Extend {
            player: name(player),
            region: region_id(region)?,
            direction: Direction::from_name(direction)
                .ok_or_else(|| format!("unknown direction {direction:?}"))?,
            amount: number(amount)?,
        },
        ("trust", [player, region, tier, grantee]) => Command::Trust {
            player: name(player),
            region: match *region {
                "all" => None,
                other => Some(region_id(other)?),
            },
            tier: parse_tier(tier)?,
            grantee: parse_grantee(grantee),
        },
        ("untrust", [player, region, grantee]) => Command::Untrust {
            player: name(player),
            region: region_id(region)?,
            grantee: parse_grantee(grantee),
        },
        ("trustlist", [player, region]) => Command::TrustList(name(player), region_id(region)?),
        ("check", [player, tier, x, y, z]) => Command::Check {
            player: name(player),
            tier: parse_tier(tier)?,
            pos: pos(x, y, z)?,
        },
        ("blocks", [player]) => Command::Blocks(name(player)),
        ("bonus", [player, delta]) => Command::Bonus(name(player), number(delta)?),
        ("accrue", [player, delta]) => Command::Accrue(name(player), number(delta)?),
        ("abandon", [player, region]) => Command::Abandon(name(player), region_id(region)?),
        ("abandonall", [player]) => Command::AbandonAll(name(player)),
        ("transfer", [player, region, to]) => Command::Transfer {
            player: name(player),
            region: region_id(region)?,
            to: (*to != "admin").then(|| name(to)),
        },
        ("explosions", [player, region, toggle]) => {
            Command::Explosions(name(player), region_id(region)?, on_off(toggle)?)
        }
        ("restrictsubclaim", [player, region, toggle]) => {
            Command::RestrictSubclaim(name(player), region_id(region)?, on_off(toggle)?)
        }
        ("untrustall", [player, region]) => Command::UntrustAll(name(player), region_id(region)?),
        ("deleteall", [player, owner]) => {
            Command::DeleteAll(name(player), (*owner != "admin").then(|| name(owner)))
        }
        ("deleteworld", [player, world]) => Command::DeleteWorld {
            player: name(player),
            world: (*world).to_owned(),
            include_admin: false,
        },
        ("deleteworld", [player, world, "admin"]) => Command::DeleteWorld {
            player: name(player),
            world: (*world).to_owned(),
            include_admin: true,
        },
        ("bonusall", [delta]) => Command::BonusAll(number(delta)?),
        ("list", [player]) => Command::List(name(player)),
        ("op", [player, capability]) => Command::Op(name(player), parse_capability(capability)?),
        ("sweep", []) => Command::Sweep,
        ("help" | "h" | "?", []) => Command::Help,
        ("quit" | "q" | "exit", []) => Command::Quit,
        _ => return Err(format!("wrong number of arguments ({})", args.len())),
    };
    Ok(command)
}

fn name(word: &str) -> Name {
    word.to_owned()
}

fn number<T: std::str::FromStr>(word: &str) -> Result<T, String> {
    word.parse().map_err(|_| format!("not a number: {word:?}"))
}

fn pos(x: &str, y: &str, z: &str) -> Result<BlockPos, String> {
    Ok(BlockPos::new(number(x)?, number(y)?, number(z)?))
}

fn region_id(word: &str) -> Result<RegionId, String> {
    number(word.trim_start_matches('#')).map(RegionId::from_raw)
}

fn on_off(word: &str) -> Result<bool, String> {
    match word {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(format!("expected on|off, got {other:?}")),
    }
}

fn parse_tier(word: &str) -> Result<TrustTier, String> {
    TrustTier::from_name(word).ok_or_else(|| format!("unknown tier {word:?}"))
}

fn parse_mode(word: &str) -> Result<ShovelMode, String> {
    match word {
        "basic" => Ok(ShovelMode::Basic),
        "admin" => Ok(ShovelMode::Admin),
        "subdivide" => Ok(ShovelMode::Subdivide),
        other => Err(format!("unknown mode {other:?}")),
    }
}

fn parse_capability(word: &str) -> Result<Capability, String> {
    match word {
        "ignoreclaims" => Ok(Capability::IgnoreClaims),
        "adminclaims" => Ok(Capability::AdminClaims),
        "deleteclaims" => Ok(Capability::DeleteClaims),
        "overridecount" => Ok(Capability::OverrideClaimCountLimit),
        "overrideblocks" => Ok(Capability::OverrideClaimBlocks),
        other => Err(format!("unknown capability {other:?}")),
    }
}

fn parse_grantee(word: &str) -> GranteeArg {
    if word == "public" || word == "all" {
        return GranteeArg::Public;
    }
    match word.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
        Some(node) if !node.is_empty() => GranteeArg::Node(node.to_owned()),
        _ => GranteeArg::Player(name(word)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_corner() {
        assert_eq!(
            parse_command("corner alice 1 64 -3"),
            Command::Corner("alice".to_owned(), BlockPos::new(1, 64, -3))
        );
    }

    #[test]
    fn test_parse_claim_with_optional_radius() {
        assert_eq!(
            parse_command("claim bob 0 70 0"),
            Command::Claim {
                player: "bob".to_owned(),
                center: BlockPos::new(0, 70, 0),
                radius: None,
            }
        );
        assert_eq!(
            parse_command("claim bob 0 70 0 8"),
            Command::Claim {
                player: "bob".to_owned(),
                center: BlockPos::new(0, 70, 0),
                radius: Some(8),
            }
        );
    }

    #[test]
    fn test_parse_trust_targets() {
        assert_eq!(
            parse_command("trust alice #3 build [group.friends]"),
            Command::Trust {
                player: "alice".to_owned(),
                region: Some(RegionId::from_raw(3)),
                tier: TrustTier::Build,
                grantee: GranteeArg::Node("group.friends".to_owned()),
            }
        );
        assert_eq!(
            parse_command("trust alice all container public"),
            Command::Trust {
                player: "alice".to_owned(),
                region: None,
                tier: TrustTier::Inventory,
                grantee: GranteeArg::Public,
            }
        );
    }

    #[test]
    fn test_parse_transfer_to_admin() {
        assert_eq!(
            parse_command("transfer alice 2 admin"),
            Command::Transfer {
                player: "alice".to_owned(),
                region: RegionId::from_raw(2),
                to: None,
            }
        );
    }

    #[test]
    fn test_parse_admin_commands() {
        assert_eq!(
            parse_command("deleteall root admin"),
            Command::DeleteAll("root".to_owned(), None)
        );
        assert_eq!(
            parse_command("deleteworld root nether admin"),
            Command::DeleteWorld {
                player: "root".to_owned(),
                world: "nether".to_owned(),
                include_admin: true,
            }
        );
        assert_eq!(
            parse_command("restrictsubclaim alice 4 on"),
            Command::RestrictSubclaim("alice".to_owned(), RegionId::from_raw(4), true)
        );
        assert_eq!(
            parse_command("untrustall alice 4"),
            Command::UntrustAll("alice".to_owned(), RegionId::from_raw(4))
        );
        assert_eq!(parse_command("bonusall -20"), Command::BonusAll(-20));
        assert!(matches!(parse_command("deleteworld root nether everything"), Command::Invalid(_)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_command("corner alice 1 2"), Command::Invalid(_)));
        assert!(matches!(parse_command("check alice fly 0 0 0"), Command::Invalid(_)));
        assert!(matches!(parse_command("extend alice 1 up 3"), Command::Invalid(_)));
        assert_eq!(parse_command("dance"), Command::Unknown("dance".to_owned()));
        assert_eq!(parse_command("   "), Command::Unknown(String::new()));
    }

    #[test]
    fn test_usage_lists_every_command() {
        assert_eq!(usage().count(), USAGE.len());
    }
}
