//! Balance folding over bills and settlements.
//!
//! Balances are derived data: they are recomputed from the stored bills and
//! transactions on every query and never persisted.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{Bill, Money, Transaction};

/// What `user_id` still owes on `bill`: their share minus what they settled.
///
/// Only transactions recorded against `bill` by `user_id` are counted.
#[must_use]
pub fn amount_owed(bill: &Bill, transactions: &[Transaction], user_id: Uuid) -> Money {
    let settled: Money = transactions
        .iter()
        .filter(|tx| tx.bill_id == bill.id && tx.recorded_by == user_id)
        .map(|tx| tx.amount)
        .sum();
    bill.share_of(user_id) - settled
}

/// Net position of every user across `bills`.
///
/// Positive means the user is owed money, negative means they owe. Each
/// share moves its amount from the debtor to the bill's payer, and each
/// settlement moves its amount back from the payer to whoever recorded it,
/// share or not. A payer's share or settlement on their own bill nets to
/// zero and is skipped. Transactions on bills outside `bills` are ignored.
/// The values always sum to zero.
#[must_use]
pub fn net_balances(bills: &[Bill], transactions: &[Transaction]) -> HashMap<Uuid, Money> {
    let payers: HashMap<Uuid, Uuid> = bills.iter().map(|bill| (bill.id, bill.payer_id)).collect();

    let mut balances: HashMap<Uuid, Money> = HashMap::new();
    for bill in bills {
        for share in bill.shares.iter().filter(|s| s.user_id != bill.payer_id) {
            *balances.entry(share.user_id).or_default() -= share.amount;
            *balances.entry(bill.payer_id).or_default() += share.amount;
        }
    }
    for tx in transactions {
        let Some(payer_id) = payers.get(&tx.bill_id).copied() else {
            continue;
        };
        if tx.recorded_by == payer_id {
            continue;
        }
        *balances.entry(tx.recorded_by).or_default() += tx.amount;
        *balances.entry(payer_id).or_default() -= tx.amount;
    }
    balances
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::Share;

    fn bill(payer_id: Uuid, shares: &[(Uuid, i64)]) -> Bill {
        Bill {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            description: "dinner".to_string(),
            total: Money::new(shares.iter().map(|(_, a)| a).sum::<i64>() * 2),
            payer_id,
            payer_portion: Money::ZERO,
            created_by: payer_id,
            created_at: Utc::now(),
            shares: shares
                .iter()
                .map(|(user_id, amount)| Share {
                    user_id: *user_id,
                    amount: Money::new(*amount),
                })
                .collect(),
        }
    }

    fn settle(bill: &Bill, user_id: Uuid, cents: i64) -> Transaction {
        Transaction::new(bill.id, Money::new(cents), user_id, Utc::now()).unwrap()
    }

    #[test]
    fn owed_is_raw_share_without_settlements() {
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let bill = bill(alice, &[(bob, 3000)]);

        assert_eq!(amount_owed(&bill, &[], bob), Money::new(3000));
        assert_eq!(amount_owed(&bill, &[], alice), Money::ZERO);
    }

    #[test]
    fn owed_decreases_with_each_settlement() {
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let bill = bill(alice, &[(bob, 3000)]);

        let mut txs = Vec::new();
        let mut previous = amount_owed(&bill, &txs, bob);
        for cents in [500, 1000, 1500, 200] {
            txs.push(settle(&bill, bob, cents));
            let current = amount_owed(&bill, &txs, bob);
            assert!(current < previous);
            previous = current;
        }
        assert_eq!(previous, Money::new(-200));
    }

    #[test]
    fn owed_ignores_other_users_and_bills() {
        let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let first = bill(alice, &[(bob, 3000), (carol, 3000)]);
        let second = bill(alice, &[(bob, 1000)]);
        let txs = vec![settle(&first, carol, 3000), settle(&second, bob, 1000)];

        assert_eq!(amount_owed(&first, &txs, bob), Money::new(3000));
        assert_eq!(amount_owed(&first, &txs, carol), Money::ZERO);
    }

    #[test]
    fn net_balances_move_debt_to_payer() {
        let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let dinner = bill(alice, &[(bob, 3000), (carol, 3000)]);
        let taxi = bill(bob, &[(alice, 1000)]);
        let txs = vec![settle(&dinner, carol, 1000)];

        let balances = net_balances(&[dinner, taxi], &txs);

        assert_eq!(balances[&alice], Money::new(4000));
        assert_eq!(balances[&bob], Money::new(-2000));
        assert_eq!(balances[&carol], Money::new(-2000));
        assert_eq!(balances.values().sum::<Money>(), Money::ZERO);
    }

    #[test]
    fn settlement_without_share_still_counts() {
        let (alice, bob, dave) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let dinner = bill(alice, &[(bob, 3000)]);
        let txs = vec![settle(&dinner, dave, 1000)];

        let balances = net_balances(&[dinner.clone()], &txs);

        assert_eq!(balances[&dave], Money::new(1000));
        assert_eq!(balances[&alice], Money::new(2000));
        assert_eq!(balances[&bob], Money::new(-3000));
        assert_eq!(balances[&dave], -amount_owed(&dinner, &txs, dave));
        assert_eq!(balances.values().sum::<Money>(), Money::ZERO);
    }

    #[test]
    fn payer_settling_own_bill_is_neutral() {
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let dinner = bill(alice, &[(bob, 3000)]);
        let txs = vec![settle(&dinner, alice, 500)];

        let balances = net_balances(&[dinner], &txs);

        assert_eq!(balances[&alice], Money::new(3000));
        assert_eq!(balances[&bob], Money::new(-3000));
    }

    #[test]
    fn payer_share_on_own_bill_is_neutral() {
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let lunch = bill(alice, &[(alice, 500), (bob, 500)]);

        let balances = net_balances(&[lunch], &[]);

        assert_eq!(balances[&alice], Money::new(500));
        assert_eq!(balances[&bob], Money::new(-500));
    }
}
