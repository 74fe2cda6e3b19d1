use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
pub enum Users {
    Table,
    Id,
    Email,
    SubscriptionPlan,
    SubscriptionStatus,
    AnalysisQuota,
    AnalysisUsedThisMonth,
    CurrentPeriodStart,
    CurrentPeriodEnd,
    StripeCustomerId,
    StripeSubscriptionId,
    CancelAtPeriodEnd,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("subscription_plan"))
                    .values(vec![
                        Alias::new("free"),
                        Alias::new("smart"),
                        Alias::new("pro"),
                        Alias::new("scale"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("subscription_status"))
                    .values(vec![
                        Alias::new("none"),
                        Alias::new("active"),
                        Alias::new("trialing"),
                        Alias::new("past_due"),
                        Alias::new("incomplete"),
                        Alias::new("incomplete_expired"),
                        Alias::new("unpaid"),
                        Alias::new("paused"),
                        Alias::new("canceled"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string_len(320).null())
                    .col(
                        ColumnDef::new(Users::SubscriptionPlan)
                            .custom(Alias::new("subscription_plan"))
                            .not_null()
                            .default(Expr::cust("'free'::subscription_plan")),
                    )
                    .col(
                        ColumnDef::new(Users::SubscriptionStatus)
                            .custom(Alias::new("subscription_status"))
                            .not_null()
                            .default(Expr::cust("'none'::subscription_status")),
                    )
                    .col(
                        ColumnDef::new(Users::AnalysisQuota)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::AnalysisUsedThisMonth)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::CurrentPeriodStart)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Users::CurrentPeriodEnd)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Users::StripeCustomerId)
                            .string_len(255)
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Users::StripeSubscriptionId)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Users::CancelAtPeriodEnd)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .check(Expr::col(Users::AnalysisUsedThisMonth).gte(0))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_current_period_end")
                    .table(Users::Table)
                    .col(Users::CurrentPeriodEnd)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Users::Table).to_owned())
            .await?;
        manager
            .drop_type(
                Type::drop()
                    .name(Alias::new("subscription_status"))
                    .to_owned(),
            )
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("subscription_plan")).to_owned())
            .await?;
        Ok(())
    }
}
