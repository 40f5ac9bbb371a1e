use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    Allocation, Bill, CreateBillCmd, EngineError, Group, Money, ResultEngine, allocate_shares,
    bill_shares, bills,
};

use super::{Engine, normalize_required_name, with_tx};

/// Everything [`Engine::record_bill`] needs to persist a bill aggregate.
pub(super) struct NewBill<'a> {
    pub description: String,
    pub total: Money,
    pub payer_id: Uuid,
    pub group: &'a Group,
    pub created_by: Uuid,
    pub allocation: Allocation,
}

impl Engine {
    /// Creates a bill in a group and splits it among the participants.
    ///
    /// Membership is checked first, then the payer (the requester unless
    /// `cmd.payer_id` says otherwise) is resolved, the shares are allocated
    /// and the bill is written with all of its shares. Everything happens in
    /// one database transaction.
    pub async fn create_bill(&self, cmd: CreateBillCmd) -> ResultEngine<Bill> {
        let CreateBillCmd {
            group_id,
            user_id,
            description,
            total,
            payer_id,
            shares,
        } = cmd;

        with_tx!(self, |db_tx| {
            let group = self
                .authorize_group_access_in(&db_tx, group_id, user_id)
                .await?;
            let description = normalize_required_name(&description, "bill description")?;

            let payer_id = payer_id.unwrap_or(user_id);
            self.require_user(&db_tx, payer_id).await?;
            if !group.has_member(payer_id) {
                return Err(EngineError::InvalidSplit(format!(
                    "payer {payer_id} is not a member of group {group_id}"
                )));
            }

            let explicit = shares.as_deref().filter(|specs| !specs.is_empty());
            if let Some(specs) = explicit {
                let named: Vec<Uuid> = specs.iter().map(|spec| spec.user_id).collect();
                self.require_users(&db_tx, &named).await?;
            }

            let allocation = allocate_shares(total, &group.members, payer_id, explicit)?;

            self.record_bill(
                &db_tx,
                NewBill {
                    description,
                    total,
                    payer_id,
                    group: &group,
                    created_by: user_id,
                    allocation,
                },
            )
            .await
        })
    }

    /// Returns a bill of a group `user_id` belongs to.
    pub async fn bill(&self, bill_id: Uuid, user_id: Uuid) -> ResultEngine<Bill> {
        with_tx!(self, |db_tx| {
            let bill = self.get_bill(&db_tx, bill_id).await?;
            self.authorize_group_access_in(&db_tx, bill.group_id, user_id)
                .await?;
            Ok(bill)
        })
    }

    /// Lists the bills of a group, newest first.
    pub async fn list_bills(&self, group_id: Uuid, user_id: Uuid) -> ResultEngine<Vec<Bill>> {
        with_tx!(self, |db_tx| {
            self.authorize_group_access_in(&db_tx, group_id, user_id)
                .await?;
            self.group_bills(&db_tx, group_id).await
        })
    }

    /// Persists a bill together with one share row per allocated user.
    ///
    /// Share users must be current members of the group and the allocation
    /// must cover the total. Runs inside the caller's transaction, so either
    /// the bill and all of its shares are committed or none of them is.
    pub(super) async fn record_bill(
        &self,
        db: &DatabaseTransaction,
        new_bill: NewBill<'_>,
    ) -> ResultEngine<Bill> {
        let NewBill {
            description,
            total,
            payer_id,
            group,
            created_by,
            allocation,
        } = new_bill;

        if !total.is_positive() {
            return Err(EngineError::InvalidAmount(
                "bill total must be > 0".to_string(),
            ));
        }
        if !allocation.is_balanced(total) {
            return Err(EngineError::InvalidSplit(match allocation.allocated() {
                Some(allocated) => format!("shares add up to {allocated}, bill total is {total}"),
                None => format!("shares overflow, bill total is {total}"),
            }));
        }
        if let Some(outsider) = allocation
            .shares
            .keys()
            .find(|user_id| !group.has_member(**user_id))
        {
            return Err(EngineError::InvalidSplit(format!(
                "user {outsider} is not a member of group {}",
                group.id
            )));
        }

        let bill_id = Uuid::new_v4();
        bills::ActiveModel {
            id: ActiveValue::Set(bill_id),
            group_id: ActiveValue::Set(group.id),
            description: ActiveValue::Set(description),
            total_minor: ActiveValue::Set(total.cents()),
            payer_id: ActiveValue::Set(payer_id),
            payer_portion_minor: ActiveValue::Set(allocation.payer_portion.cents()),
            created_by: ActiveValue::Set(created_by),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(db)
        .await
        .map_err(EngineError::from_write)?;

        for (user_id, amount) in &allocation.shares {
            bill_shares::ActiveModel {
                bill_id: ActiveValue::Set(bill_id),
                user_id: ActiveValue::Set(*user_id),
                amount_minor: ActiveValue::Set(amount.cents()),
            }
            .insert(db)
            .await
            .map_err(EngineError::from_write)?;
        }

        tracing::debug!(
            %bill_id,
            group_id = %group.id,
            total = %total,
            shares = allocation.shares.len(),
            "recorded bill"
        );

        // Reload so the caller sees exactly what was stored.
        self.get_bill(db, bill_id).await
    }

    /// Loads a bill aggregate with its shares.
    pub(super) async fn get_bill(&self, db: &DatabaseTransaction, bill_id: Uuid) -> ResultEngine<Bill> {
        let model = bills::Entity::find_by_id(bill_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("bill".to_string()))?;
        let shares = bill_shares::Entity::find()
            .filter(bill_shares::Column::BillId.eq(bill_id))
            .all(db)
            .await?;
        Ok(Bill::from_parts(model, shares))
    }

    pub(super) async fn group_bills(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<Vec<Bill>> {
        let models = bills::Entity::find()
            .filter(bills::Column::GroupId.eq(group_id))
            .order_by_desc(bills::Column::CreatedAt)
            .order_by_asc(bills::Column::Id)
            .all(db)
            .await?;
        if models.is_empty() {
            return Ok(Vec::new());
        }

        let mut share_models = bill_shares::Entity::find()
            .filter(bill_shares::Column::BillId.is_in(models.iter().map(|m| m.id)))
            .all(db)
            .await?;

        let mut out = Vec::with_capacity(models.len());
        for model in models {
            let (own, rest): (Vec<_>, Vec<_>) = share_models
                .into_iter()
                .partition(|share| share.bill_id == model.id);
            share_models = rest;
            out.push(Bill::from_parts(model, own));
        }
        Ok(out)
    }
}
