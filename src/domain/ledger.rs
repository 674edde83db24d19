use super::{Member, Tier};
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// In-memory registry of loyalty members
///
/// Every operation takes the single lock around the member map for its whole duration. Clones
/// share the same map; use [`MembershipLedger::new`] for an independent ledger.
#[derive(Clone, Debug, Default)]
pub struct MembershipLedger {
    members: Arc<Mutex<HashMap<String, Member>>>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("member {0} is already enrolled")]
    AlreadyEnrolled(String),

    #[error("member identifier is empty")]
    EmptyIdentifier,

    #[error("member {0} does not exist")]
    MemberNotFound(String),

    /// Accrual and redemption amounts must be strictly positive
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    /// Redeeming more points than the member holds
    ///
    /// This would result in a negative balance, which is not supported.
    #[error("trying to redeem {requested} points from {current_points}")]
    InsufficientPoints { current_points: u64, requested: i64 },

    #[error("adding {requested} points to {current_points} overflows the balance")]
    PointsOverflow { current_points: u64, requested: i64 },
}

impl MembershipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enroll a new member at 0 points in the lowest tier
    ///
    /// Returns `false` if the identifier is already enrolled or empty.
    pub fn enroll(&self, identifier: impl Into<String>) -> bool {
        self.try_enroll(identifier).is_ok()
    }

    pub fn try_enroll(&self, identifier: impl Into<String>) -> Result<Member, LedgerError> {
        let identifier = identifier.into();
        if identifier.is_empty() {
            return Err(rejected(LedgerError::EmptyIdentifier));
        }

        match self.lock().entry(identifier) {
            Entry::Occupied(entry) => Err(rejected(LedgerError::AlreadyEnrolled(
                entry.key().clone(),
            ))),
            Entry::Vacant(entry) => {
                let member = Member::new(entry.key().clone());
                tracing::debug!(identifier = %member.identifier(), "member enrolled");
                Ok(entry.insert(member).clone())
            }
        }
    }

    /// Snapshot of a member's points and tier
    pub fn details(&self, identifier: &str) -> Option<Member> {
        self.lock().get(identifier).cloned()
    }

    pub fn tier(&self, identifier: &str) -> Option<Tier> {
        self.details(identifier).map(|member| member.tier())
    }

    /// Accrue points for an existing member
    ///
    /// Returns `false` without touching the balance if the member is unknown or `amount` is not
    /// strictly positive.
    pub fn add_points(&self, identifier: &str, amount: i64) -> bool {
        self.try_add_points(identifier, amount).is_ok()
    }

    pub fn try_add_points(&self, identifier: &str, amount: i64) -> Result<Member, LedgerError> {
        self.apply(identifier, amount, |current_points| {
            current_points
                .checked_add(amount.unsigned_abs())
                .ok_or(LedgerError::PointsOverflow {
                    current_points,
                    requested: amount,
                })
        })
    }

    /// Redeem points from an existing member
    ///
    /// Returns `false` without touching the balance if the member is unknown, `amount` is not
    /// strictly positive, or the member holds fewer than `amount` points.
    pub fn redeem_points(&self, identifier: &str, amount: i64) -> bool {
        self.try_redeem_points(identifier, amount).is_ok()
    }

    pub fn try_redeem_points(&self, identifier: &str, amount: i64) -> Result<Member, LedgerError> {
        self.apply(identifier, amount, |current_points| {
            current_points
                .checked_sub(amount.unsigned_abs())
                .ok_or(LedgerError::InsufficientPoints {
                    current_points,
                    requested: amount,
                })
        })
    }

    /// Validate and apply a balance change
    ///
    /// `new_points` computes the new balance from the current one. Nothing is written unless every
    /// check passes, and the tier is re-derived together with the balance.
    fn apply<F>(&self, identifier: &str, amount: i64, new_points: F) -> Result<Member, LedgerError>
    where
        F: FnOnce(u64) -> Result<u64, LedgerError>,
    {
        let mut members = self.lock();
        let member = members
            .get_mut(identifier)
            .ok_or_else(|| rejected(LedgerError::MemberNotFound(identifier.to_string())))?;
        if amount <= 0 {
            return Err(rejected(LedgerError::NonPositiveAmount(amount)));
        }

        let points = new_points(member.points()).map_err(rejected)?;
        let old_tier = member.tier();
        member.set_points(points);
        tracing::debug!(
            identifier,
            amount,
            points,
            tier = %member.tier(),
            tier_changed = old_tier != member.tier(),
            "balance updated"
        );

        Ok(member.clone())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Member>> {
        // Mutations are applied in a single step after all checks, so a poisoned map is still
        // consistent.
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn rejected(err: LedgerError) -> LedgerError {
    tracing::debug!(reason = %err, "ledger operation rejected");
    err
}
