//! Shared-bill ledger engine.
//!
//! Members of a group record bills, the engine splits each bill into shares
//! and keeps track of who owes whom as settlements come in. Every public
//! operation on [`Engine`] runs in its own database transaction.

pub use balance::{amount_owed, net_balances};
pub use bills::{Bill, Share};
pub use commands::CreateBillCmd;
pub use error::EngineError;
pub use groups::Group;
pub use money::Money;
pub use ops::{Engine, EngineBuilder};
pub use split::{Allocation, SPLIT_TOLERANCE_CENTS, ShareSpec, allocate_shares, split_divisor};
pub use transactions::Transaction;
pub use users::User;

mod balance;
mod bill_shares;
mod bills;
mod commands;
mod error;
mod group_members;
mod groups;
mod money;
mod ops;
mod split;
mod transactions;
mod users;

type ResultEngine<T> = Result<T, EngineError>;
