//! Share allocation.
//!
//! Turns an expense total and a list of participants into per-person owed
//! amounts. Allocation never writes anything; `create_expense` persists the
//! result.
//!
//! The allocator does not reconcile: an equal split of a total that is not
//! divisible by the number of participants leaves a gap of a few cents, and
//! a custom split is returned exactly as given. Use [`check_reconciliation`]
//! (or [`ReconciliationMode::Strict`] on the engine) to detect gaps.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents, PersonRef, ResultEngine};

/// Owed amount per participant.
pub type Allocation = BTreeMap<PersonRef, MoneyCents>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Every participant owes `total / n`, rounded to the cent.
    Equal,
    /// Caller-supplied amounts, used verbatim.
    Custom(Allocation),
}

/// Computes the owed amount for every participant.
///
/// Fails with [`EngineError::InvalidSplit`] when there are no participants
/// or a participant is listed twice.
///
/// Under [`SplitStrategy::Custom`] the amounts are keyed by their own people:
/// `participants` is only checked for being non-empty and unique, and the
/// map is returned as given even when its keys differ from `participants`.
pub fn allocate(
    total: MoneyCents,
    participants: &[PersonRef],
    strategy: &SplitStrategy,
) -> ResultEngine<Allocation> {
    if participants.is_empty() {
        return Err(EngineError::InvalidSplit(
            "at least one participant is required".to_string(),
        ));
    }
    let unique: BTreeSet<PersonRef> = participants.iter().copied().collect();
    if unique.len() != participants.len() {
        return Err(EngineError::InvalidSplit(
            "participants must be unique".to_string(),
        ));
    }

    match strategy {
        SplitStrategy::Equal => {
            let share = total.divide_evenly(participants.len()).ok_or_else(|| {
                EngineError::InvalidSplit("at least one participant is required".to_string())
            })?;
            Ok(participants.iter().map(|p| (*p, share)).collect())
        }
        SplitStrategy::Custom(amounts) => {
            if amounts.is_empty() {
                return Err(EngineError::InvalidSplit(
                    "custom split has no amounts".to_string(),
                ));
            }
            Ok(amounts.clone())
        }
    }
}

/// How `create_expense` treats shares that do not add up to the total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationMode {
    /// Log a warning and store the expense anyway.
    #[default]
    Lenient,
    /// Reject the expense with [`EngineError::ShareMismatch`].
    Strict,
}

/// Comparison between an expense total and the sum of its shares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reconciliation {
    pub total: MoneyCents,
    pub allocated: MoneyCents,
    /// `total - allocated`; positive when the shares leave part uncovered.
    pub gap: MoneyCents,
}

impl Reconciliation {
    pub fn is_exact(&self) -> bool {
        self.gap.is_zero()
    }
}

/// Compares `total` with the sum of `amounts`.
///
/// Fails with [`EngineError::Validation`] when the sum or the gap does not
/// fit in a [`MoneyCents`].
pub fn check_reconciliation<'a>(
    total: MoneyCents,
    amounts: impl IntoIterator<Item = &'a MoneyCents>,
) -> ResultEngine<Reconciliation> {
    let overflow = || EngineError::Validation("share amounts are too large".to_string());
    let allocated = amounts
        .into_iter()
        .try_fold(MoneyCents::ZERO, |sum, amount| sum.checked_add(*amount))
        .ok_or_else(overflow)?;
    let gap = total.checked_sub(allocated).ok_or_else(overflow)?;
    Ok(Reconciliation {
        total,
        allocated,
        gap,
    })
}
