use chrono::Utc;
use sea_orm::{TransactionTrait, prelude::*};

use crate::{EngineError, Money, ResultEngine, Transaction, transactions};

use super::{Engine, with_tx};

impl Engine {
    /// Records a settlement payment against a bill.
    ///
    /// The bill must exist and the recorder must belong to its group. Both
    /// checks and the insert share one database transaction: if a check
    /// fails, nothing is written.
    pub async fn record_transaction(
        &self,
        bill_id: Uuid,
        amount: Money,
        recorder_id: Uuid,
    ) -> ResultEngine<Transaction> {
        with_tx!(self, |db_tx| {
            let bill = self.get_bill(&db_tx, bill_id).await?;
            self.authorize_group_access_in(&db_tx, bill.group_id, recorder_id)
                .await?;

            let tx = Transaction::new(bill.id, amount, recorder_id, Utc::now())?;
            let model = transactions::ActiveModel::from(&tx)
                .insert(&db_tx)
                .await
                .map_err(EngineError::from_write)?;

            tracing::debug!(
                transaction_id = %tx.id,
                %bill_id,
                amount = %amount,
                "recorded settlement"
            );
            Ok(Transaction::from(model))
        })
    }

    /// Lists the settlements recorded against a bill, oldest first.
    pub async fn list_transactions(
        &self,
        bill_id: Uuid,
        user_id: Uuid,
    ) -> ResultEngine<Vec<Transaction>> {
        with_tx!(self, |db_tx| {
            let bill = self.get_bill(&db_tx, bill_id).await?;
            self.authorize_group_access_in(&db_tx, bill.group_id, user_id)
                .await?;
            self.bill_transactions(&db_tx, &[bill_id]).await
        })
    }
}
