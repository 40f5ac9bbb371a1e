use std::collections::HashMap;

use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{Money, ResultEngine, Transaction, balance, transactions};

use super::{Engine, with_tx};

impl Engine {
    /// What `user_id` still owes on a bill: their share (zero if they have
    /// none) minus the settlements they recorded against it.
    ///
    /// Recomputed from the stored bill and transactions on every call.
    pub async fn amount_owed(&self, bill_id: Uuid, user_id: Uuid) -> ResultEngine<Money> {
        with_tx!(self, |db_tx| {
            let bill = self.get_bill(&db_tx, bill_id).await?;
            self.authorize_group_access_in(&db_tx, bill.group_id, user_id)
                .await?;
            let txs = self.bill_transactions(&db_tx, &[bill_id]).await?;
            Ok(balance::amount_owed(&bill, &txs, user_id))
        })
    }

    /// Net position of `user_id` across every bill of a group.
    ///
    /// Positive means the user is owed money, negative means they owe.
    pub async fn net_balance(&self, group_id: Uuid, user_id: Uuid) -> ResultEngine<Money> {
        let balances = self.group_balances(group_id, user_id).await?;
        Ok(balances.get(&user_id).copied().unwrap_or_default())
    }

    /// Net position of every member with a stake in the group's bills.
    pub async fn group_balances(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> ResultEngine<HashMap<Uuid, Money>> {
        with_tx!(self, |db_tx| {
            self.authorize_group_access_in(&db_tx, group_id, user_id)
                .await?;
            let bills = self.group_bills(&db_tx, group_id).await?;
            let bill_ids: Vec<Uuid> = bills.iter().map(|bill| bill.id).collect();
            let txs = self.bill_transactions(&db_tx, &bill_ids).await?;
            Ok(balance::net_balances(&bills, &txs))
        })
    }

    pub(super) async fn bill_transactions(
        &self,
        db: &DatabaseTransaction,
        bill_ids: &[Uuid],
    ) -> ResultEngine<Vec<Transaction>> {
        if bill_ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = transactions::Entity::find()
            .filter(transactions::Column::BillId.is_in(bill_ids.iter().copied()))
            .order_by_asc(transactions::Column::CreatedAt)
            .order_by_asc(transactions::Column::Id)
            .all(db)
            .await?;
        Ok(models.into_iter().map(Transaction::from).collect())
    }
}
