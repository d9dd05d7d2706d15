//! Decision policy – blocked flags to a movement command.
//!
//! The policy is an ordered rule table evaluated top to bottom; the first
//! matching row wins.  The last row matches everything, so every one of the
//! eight flag combinations yields exactly one command.
//!
//! | # | front   | left    | right   | command   |
//! |---|---------|---------|---------|-----------|
//! | 1 | blocked | clear   | any     | `Left`    |
//! | 2 | blocked | blocked | clear   | `Right`   |
//! | 3 | blocked | blocked | blocked | `Stop`    |
//! | 4 | clear   | blocked | clear   | `Right`   |
//! | 5 | clear   | clear   | blocked | `Left`    |
//! | 6 | any     | any     | any     | `Forward` |

use sweepnav_types::{BlockedFlags, Command};

/// Condition on a single zone's blocked flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneState {
    Blocked,
    Clear,
    Any,
}

impl ZoneState {
    fn matches(self, blocked: bool) -> bool {
        match self {
            ZoneState::Blocked => blocked,
            ZoneState::Clear => !blocked,
            ZoneState::Any => true,
        }
    }
}

/// One row of the policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyRule {
    pub front: ZoneState,
    pub left: ZoneState,
    pub right: ZoneState,
    pub command: Command,
}

impl PolicyRule {
    const fn new(front: ZoneState, left: ZoneState, right: ZoneState, command: Command) -> Self {
        Self {
            front,
            left,
            right,
            command,
        }
    }

    /// `true` if `flags` satisfy every zone condition of this row.
    pub fn matches(&self, flags: BlockedFlags) -> bool {
        self.front.matches(flags.front)
            && self.left.matches(flags.left)
            && self.right.matches(flags.right)
    }
}

use ZoneState::{Any, Blocked, Clear};

/// The policy table, in evaluation order.
pub const RULES: [PolicyRule; 6] = [
    PolicyRule::new(Blocked, Clear, Any, Command::Left),
    PolicyRule::new(Blocked, Blocked, Clear, Command::Right),
    PolicyRule::new(Blocked, Blocked, Blocked, Command::Stop),
    PolicyRule::new(Clear, Blocked, Clear, Command::Right),
    PolicyRule::new(Clear, Clear, Blocked, Command::Left),
    PolicyRule::new(Any, Any, Any, Command::Forward),
];

/// Pick the movement command for one cycle.
pub fn decide(flags: BlockedFlags) -> Command {
    RULES
        .iter()
        .find(|rule| rule.matches(flags))
        .map_or(Command::Forward, |rule| rule.command)
}
