//! Initial schema.
//!
//! - `users`: registered users, unique by email
//! - `groups`: named groups of users
//! - `group_members`: group membership (one row per user and group)
//! - `bills`: expenses recorded in a group
//! - `bill_shares`: what each participant owes on a bill
//! - `transactions`: settlement payments recorded against a bill

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Name,
    Email,
    Password,
}

#[derive(Iden)]
enum Groups {
    Table,
    Id,
    Name,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum GroupMembers {
    Table,
    GroupId,
    UserId,
    JoinedAt,
}

#[derive(Iden)]
enum Bills {
    Table,
    Id,
    GroupId,
    Description,
    TotalMinor,
    PayerId,
    PayerPortionMinor,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum BillShares {
    Table,
    BillId,
    UserId,
    AmountMinor,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    BillId,
    AmountMinor,
    RecordedBy,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Name).string().not_null())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-users-email-unique")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Groups::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Groups::Name).string().not_null())
                    .col(ColumnDef::new(Groups::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Groups::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-groups-created_by")
                            .from(Groups::Table, Groups::CreatedBy)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupMembers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(GroupMembers::GroupId).uuid().not_null())
                    .col(ColumnDef::new(GroupMembers::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(GroupMembers::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(GroupMembers::GroupId)
                            .col(GroupMembers::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_members-group_id")
                            .from(GroupMembers::Table, GroupMembers::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_members-user_id")
                            .from(GroupMembers::Table, GroupMembers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-group_members-user_id")
                    .table(GroupMembers::Table)
                    .col(GroupMembers::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Bills::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bills::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Bills::GroupId).uuid().not_null())
                    .col(ColumnDef::new(Bills::Description).string().not_null())
                    .col(ColumnDef::new(Bills::TotalMinor).big_integer().not_null())
                    .col(ColumnDef::new(Bills::PayerId).uuid().not_null())
                    .col(
                        ColumnDef::new(Bills::PayerPortionMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Bills::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Bills::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bills-group_id")
                            .from(Bills::Table, Bills::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bills-payer_id")
                            .from(Bills::Table, Bills::PayerId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bills-created_by")
                            .from(Bills::Table, Bills::CreatedBy)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bills-group_id-created_at")
                    .table(Bills::Table)
                    .col(Bills::GroupId)
                    .col(Bills::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // The composite key keeps a user to one share per bill.
        manager
            .create_table(
                Table::create()
                    .table(BillShares::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BillShares::BillId).uuid().not_null())
                    .col(ColumnDef::new(BillShares::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(BillShares::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(BillShares::BillId)
                            .col(BillShares::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bill_shares-bill_id")
                            .from(BillShares::Table, BillShares::BillId)
                            .to(Bills::Table, Bills::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bill_shares-user_id")
                            .from(BillShares::Table, BillShares::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::BillId).uuid().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::RecordedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-bill_id")
                            .from(Transactions::Table, Transactions::BillId)
                            .to(Bills::Table, Bills::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-recorded_by")
                            .from(Transactions::Table, Transactions::RecordedBy)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-bill_id")
                    .table(Transactions::Table)
                    .col(Transactions::BillId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Reverse order of creation (FK dependencies).
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BillShares::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Bills::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Groups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
