use std::fmt;

pub mod ledger;

pub use ledger::{LedgerError, MembershipLedger};

/// Minimum point balance for each tier, lowest first
pub const TIER_TABLE: [(Tier, u64); 4] = [
    (Tier::Bronze, 0),
    (Tier::Silver, 5_000),
    (Tier::Gold, 15_000),
    (Tier::Platinum, 30_000),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    /// Minimum number of points required to hold this tier
    pub fn threshold(&self) -> u64 {
        TIER_TABLE
            .iter()
            .find(|(tier, _)| tier == self)
            .map(|(_, threshold)| *threshold)
            .unwrap_or(0)
    }

    /// Tier for a given point balance
    ///
    /// The table is scanned from the highest threshold down and the first threshold that the
    /// balance reaches wins.
    pub fn for_points(points: u64) -> Tier {
        TIER_TABLE
            .iter()
            .rev()
            .find(|(_, threshold)| points >= *threshold)
            .map(|(tier, _)| *tier)
            .unwrap_or(Tier::Bronze)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Snapshot of an enrolled passenger
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    /// Unique key for the `Member` within a ledger
    ///
    /// This is the passenger name, but any stable unique string works.
    identifier: String,
    /// Number of accrued loyalty points
    points: u64,
    /// Always derived from `points`
    tier: Tier,
}

impl Member {
    pub(crate) fn new(identifier: String) -> Self {
        Self {
            identifier,
            points: 0,
            tier: Tier::Bronze,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn points(&self) -> u64 {
        self.points
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Replace the balance and re-derive the tier in the same step
    pub(crate) fn set_points(&mut self, points: u64) {
        self.points = points;
        self.tier = Tier::for_points(points);
    }
}
