//! Command structs for engine operations.
//!
//! These types group parameters for write operations, keeping call sites
//! readable and avoiding long argument lists.

use uuid::Uuid;

use crate::{Money, ShareSpec};

/// Create a bill in a group.
#[derive(Clone, Debug)]
pub struct CreateBillCmd {
    pub group_id: Uuid,
    /// Requesting user; must be a member of the group.
    pub user_id: Uuid,
    pub description: String,
    pub total: Money,
    /// Defaults to the requesting user.
    pub payer_id: Option<Uuid>,
    /// Explicit split. `None` splits evenly among all members but the payer.
    pub shares: Option<Vec<ShareSpec>>,
}

impl CreateBillCmd {
    #[must_use]
    pub fn new(
        group_id: Uuid,
        user_id: Uuid,
        description: impl Into<String>,
        total: Money,
    ) -> Self {
        Self {
            group_id,
            user_id,
            description: description.into(),
            total,
            payer_id: None,
            shares: None,
        }
    }

    #[must_use]
    pub fn payer(mut self, payer_id: Uuid) -> Self {
        self.payer_id = Some(payer_id);
        self
    }

    /// Adds a participant owing a fixed amount.
    #[must_use]
    pub fn fixed_share(mut self, user_id: Uuid, amount: Money) -> Self {
        self.shares
            .get_or_insert_with(Vec::new)
            .push(ShareSpec::fixed(user_id, amount));
        self
    }

    /// Adds a participant taking part in the even split.
    #[must_use]
    pub fn even_share(mut self, user_id: Uuid) -> Self {
        self.shares
            .get_or_insert_with(Vec::new)
            .push(ShareSpec::even(user_id));
        self
    }

    #[must_use]
    pub fn shares(mut self, shares: Vec<ShareSpec>) -> Self {
        self.shares = Some(shares);
        self
    }
}
