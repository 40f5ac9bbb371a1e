//! Share allocation.
//!
//! Turns a bill total into per-participant owed amounts. Explicit amounts are
//! kept as-is; everyone else splits what is left evenly with the payer, who
//! keeps an implicit portion and never receives a share row.
//!
//! Amounts are integer cents. The even split is a floor division and the
//! leftover cents go to the payer's portion, so
//! `sum(shares) + payer_portion == total` holds exactly.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine};

/// Largest accepted gap, in cents, between a bill total and its allocation.
pub const SPLIT_TOLERANCE_CENTS: u64 = 1;

/// One entry of an explicit split.
///
/// `amount: None` (or zero) names a participant without fixing their amount:
/// they take part in the even split of the remainder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSpec {
    pub user_id: Uuid,
    pub amount: Option<Money>,
}

impl ShareSpec {
    #[must_use]
    pub fn fixed(user_id: Uuid, amount: Money) -> Self {
        Self {
            user_id,
            amount: Some(amount),
        }
    }

    #[must_use]
    pub fn even(user_id: Uuid) -> Self {
        Self {
            user_id,
            amount: None,
        }
    }

    fn fixed_amount(&self) -> Option<Money> {
        self.amount.filter(|amount| !amount.is_zero())
    }
}

/// Result of [`allocate_shares`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Owed amount per participant.
    pub shares: BTreeMap<Uuid, Money>,
    /// What the payer covers themselves (never charged back).
    pub payer_portion: Money,
}

impl Allocation {
    /// Sum of every share plus the payer's portion, `None` on overflow.
    #[must_use]
    pub fn allocated(&self) -> Option<Money> {
        checked_sum(self.shares.values().copied())?.checked_add(self.payer_portion)
    }

    /// Whether the allocation covers `total` within [`SPLIT_TOLERANCE_CENTS`].
    #[must_use]
    pub fn is_balanced(&self, total: Money) -> bool {
        self.allocated()
            .is_some_and(|allocated| allocated.distance(total) <= SPLIT_TOLERANCE_CENTS)
    }
}

/// Number of even portions the remainder is cut into.
///
/// Every participant without a fixed amount gets one portion and the payer
/// gets one more. `fixed` counts the fixed entries of the explicit split, so
/// a split naming more fixed users than there are participants is rejected
/// instead of dividing by zero (or by a negative number).
pub fn split_divisor(participants: usize, fixed: usize) -> ResultEngine<i64> {
    let participants = i64::try_from(participants)
        .map_err(|_| EngineError::InvalidSplit("too many participants".to_string()))?;
    let fixed = i64::try_from(fixed)
        .map_err(|_| EngineError::InvalidSplit("too many fixed shares".to_string()))?;

    let divisor = participants - fixed + 1;
    if divisor <= 0 {
        return Err(EngineError::InvalidSplit(format!(
            "{fixed} fixed shares for {participants} participants"
        )));
    }
    Ok(divisor)
}

/// Splits `total` among `participants`, honoring explicit amounts.
///
/// Without an explicit split (or with an empty one) the participants are
/// `participants` minus the payer. With an explicit split the participants
/// are exactly the users it names.
pub fn allocate_shares(
    total: Money,
    participants: &[Uuid],
    payer: Uuid,
    explicit: Option<&[ShareSpec]>,
) -> ResultEngine<Allocation> {
    if !total.is_positive() {
        return Err(EngineError::InvalidAmount(
            "bill total must be > 0".to_string(),
        ));
    }

    let explicit = explicit.filter(|specs| !specs.is_empty());
    let (participants, fixed) = match explicit {
        Some(specs) => explicit_participants(specs)?,
        None => (default_participants(participants, payer), BTreeMap::new()),
    };

    let fixed_total = checked_sum(fixed.values().copied())
        .ok_or_else(|| EngineError::InvalidAmount("fixed shares overflow".to_string()))?;
    let remainder = total
        .checked_sub(fixed_total)
        .ok_or_else(|| EngineError::InvalidAmount("fixed shares overflow".to_string()))?;

    let divisor = split_divisor(participants.len(), fixed.len())?;
    let default_amount = Money::new(remainder.cents().div_euclid(divisor));
    let leftover = Money::new(remainder.cents().rem_euclid(divisor));

    let shares: BTreeMap<Uuid, Money> = participants
        .iter()
        .map(|user_id| {
            let amount = fixed.get(user_id).copied().unwrap_or(default_amount);
            (*user_id, amount)
        })
        .collect();

    let allocation = Allocation {
        shares,
        payer_portion: default_amount + leftover,
    };

    if !allocation.is_balanced(total) {
        tracing::warn!(
            total = %total,
            allocated = ?allocation.allocated(),
            "share allocation does not add up to the bill total"
        );
    }

    Ok(allocation)
}

fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
    amounts
        .into_iter()
        .try_fold(Money::ZERO, |acc, amount| acc.checked_add(amount))
}

fn default_participants(candidates: &[Uuid], payer: Uuid) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .copied()
        .filter(|user_id| *user_id != payer && seen.insert(*user_id))
        .collect()
}

fn explicit_participants(specs: &[ShareSpec]) -> ResultEngine<(Vec<Uuid>, BTreeMap<Uuid, Money>)> {
    let mut participants = Vec::with_capacity(specs.len());
    let mut fixed = BTreeMap::new();
    for spec in specs {
        if participants.contains(&spec.user_id) {
            return Err(EngineError::InvalidSplit(format!(
                "user {} appears more than once",
                spec.user_id
            )));
        }
        participants.push(spec.user_id);
        if let Some(amount) = spec.fixed_amount() {
            fixed.insert(spec.user_id, amount);
        }
    }
    Ok((participants, fixed))
}
