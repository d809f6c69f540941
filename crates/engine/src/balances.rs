//! Balance aggregation.
//!
//! Balances are never stored. They are recomputed from expenses and shares
//! each time they are needed:
//!
//! ```text
//! balance(F) = Σ F's shares in expenses created by the account
//!            − Σ the account's shares in expenses created by F
//! ```
//!
//! Positive means `F` owes the account, negative means the account owes `F`.
//! A manual friend can never create an expense, so the second term is always
//! zero for manual friends and is not even looked up.
//!
//! The fold is a single pass over the expenses: O(expenses + shares).

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{Expense, ExpenseShare, Group, MoneyCents, Person, PersonProfile, PersonRef};

/// One friend's balance with the account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendBalance {
    pub friend: PersonProfile,
    /// Σ of the friend's shares in the account's expenses.
    pub owed_to_me: MoneyCents,
    /// Σ of the account's shares in the friend's expenses.
    pub owed_by_me: MoneyCents,
    pub balance: MoneyCents,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub total_owed_to_me: MoneyCents,
    pub total_i_owe: MoneyCents,
    pub net: MoneyCents,
}

impl BalanceSummary {
    /// Totals over `balances`. A friend whose balance would overflow a total
    /// is left out of the summary.
    fn from_balances(balances: &[FriendBalance]) -> Self {
        let mut summary = Self::default();
        for friend in balances {
            let balance = friend.balance;
            let owed_to_me = summary
                .total_owed_to_me
                .checked_add(balance.positive_part());
            let i_owe = balance
                .checked_neg()
                .and_then(|owed| summary.total_i_owe.checked_add(owed.positive_part()));
            let net = summary.net.checked_add(balance);
            match (owed_to_me, i_owe, net) {
                (Some(owed_to_me), Some(i_owe), Some(net)) => {
                    summary.total_owed_to_me = owed_to_me;
                    summary.total_i_owe = i_owe;
                    summary.net = net;
                }
                _ => warn!(
                    friend = %friend.friend.id(),
                    "summary overflowed, leaving friend out"
                ),
            }
        }
        summary
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub per_friend: Vec<FriendBalance>,
    pub summary: BalanceSummary,
}

impl BalanceReport {
    /// The balance with `person`, or `None` if they are not a friend.
    pub fn balance_of(&self, person: PersonRef) -> Option<MoneyCents> {
        self.per_friend
            .iter()
            .find(|f| f.friend.person.to_ref() == person)
            .map(|f| f.balance)
    }
}

/// One group's aggregate for the account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBalance {
    pub group_id: Uuid,
    pub group_name: String,
    pub balance: MoneyCents,
}

/// Running sums for one counterparty. `None` once an addition overflowed.
#[derive(Default)]
struct Tally {
    owed_to_me: Option<MoneyCents>,
    owed_by_me: Option<MoneyCents>,
    poisoned: bool,
}

impl Tally {
    fn add(slot: &mut Option<MoneyCents>, poisoned: &mut bool, amount: MoneyCents) {
        match slot.unwrap_or(MoneyCents::ZERO).checked_add(amount) {
            Some(sum) => *slot = Some(sum),
            None => *poisoned = true,
        }
    }

    fn credit(&mut self, amount: MoneyCents) {
        Self::add(&mut self.owed_to_me, &mut self.poisoned, amount);
    }

    fn debit(&mut self, amount: MoneyCents) {
        Self::add(&mut self.owed_by_me, &mut self.poisoned, amount);
    }
}

/// Folds `expenses` (each with its decoded shares) into per-friend balances
/// for `account_id`.
///
/// Expenses created by people outside `friends` only matter when the
/// account created them. Friends with no shared expense get a zero balance.
/// A friend whose sums overflow is reported with a zero balance.
pub fn fold_balances(
    account_id: Uuid,
    friends: Vec<PersonProfile>,
    expenses: &[(Expense, Vec<ExpenseShare>)],
) -> BalanceReport {
    let me = PersonRef::Registered(account_id);
    let registered_friends: HashSet<Uuid> = friends
        .iter()
        .filter_map(|f| match f.person {
            Person::Registered { id } => Some(id),
            Person::Manual { .. } => None,
        })
        .collect();

    let mut tallies: HashMap<PersonRef, Tally> = HashMap::new();
    for (expense, shares) in expenses {
        if expense.created_by == account_id {
            for share in shares.iter().filter(|s| s.person != me) {
                tallies.entry(share.person).or_default().credit(share.amount);
            }
        } else if registered_friends.contains(&expense.created_by) {
            let creator = PersonRef::Registered(expense.created_by);
            for share in shares.iter().filter(|s| s.person == me) {
                tallies.entry(creator).or_default().debit(share.amount);
            }
        }
    }

    let per_friend: Vec<FriendBalance> = friends
        .into_iter()
        .map(|friend| {
            let key = friend.person.to_ref();
            let tally = tallies.remove(&key).unwrap_or_default();
            if tally.poisoned {
                warn!(friend = %key.id(), "balance overflowed, reporting zero");
                return FriendBalance {
                    friend,
                    owed_to_me: MoneyCents::ZERO,
                    owed_by_me: MoneyCents::ZERO,
                    balance: MoneyCents::ZERO,
                };
            }
            let owed_to_me = tally.owed_to_me.unwrap_or(MoneyCents::ZERO);
            let owed_by_me = match friend.person {
                Person::Registered { .. } => tally.owed_by_me.unwrap_or(MoneyCents::ZERO),
                Person::Manual { .. } => MoneyCents::ZERO,
            };
            let balance = owed_to_me.checked_sub(owed_by_me).unwrap_or_else(|| {
                warn!(friend = %key.id(), "balance overflowed, reporting zero");
                MoneyCents::ZERO
            });
            FriendBalance {
                friend,
                owed_to_me,
                owed_by_me,
                balance,
            }
        })
        .collect();

    let summary = BalanceSummary::from_balances(&per_friend);
    BalanceReport {
        per_friend,
        summary,
    }
}

/// Folds `expenses` into one aggregate per group in `groups`.
///
/// For each group: Σ of other people's shares in the account's expenses,
/// minus Σ of the account's shares in everyone else's expenses.
pub fn fold_group_balances(
    account_id: Uuid,
    groups: &[Group],
    expenses: &[(Expense, Vec<ExpenseShare>)],
) -> Vec<GroupBalance> {
    let me = PersonRef::Registered(account_id);
    // `None` once the group's sum overflowed.
    let mut sums: BTreeMap<Uuid, Option<MoneyCents>> =
        groups.iter().map(|g| (g.id, Some(MoneyCents::ZERO))).collect();

    for (expense, shares) in expenses {
        let Some(slot) = expense.group_id.and_then(|id| sums.get_mut(&id)) else {
            continue;
        };
        let Some(sum) = *slot else {
            continue;
        };
        let next = if expense.created_by == account_id {
            shares
                .iter()
                .filter(|s| s.person != me)
                .try_fold(sum, |acc, s| acc.checked_add(s.amount))
        } else {
            shares
                .iter()
                .filter(|s| s.person == me)
                .try_fold(sum, |acc, s| acc.checked_sub(s.amount))
        };
        if next.is_none() {
            warn!(group = ?expense.group_id, "group balance overflowed, reporting zero");
        }
        *slot = next;
    }

    groups
        .iter()
        .map(|g| GroupBalance {
            group_id: g.id,
            group_name: g.name.clone(),
            balance: sums.get(&g.id).copied().flatten().unwrap_or(MoneyCents::ZERO),
        })
        .collect()
}
