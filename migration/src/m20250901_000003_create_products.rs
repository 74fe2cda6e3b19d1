use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

use crate::m20250901_000001_create_users::Users;

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    UserId,
    SourceUrl,
    SourcePlatform,
    Title,
    PriceCents,
    ImageUrl,
    Niche,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ProductAnalyses {
    Table,
    Id,
    ProductId,
    UserId,
    Verdict,
    CompetitionScore,
    SaturationScore,
    LaunchPotentialScore,
    MarketingAngles,
    Summary,
    FirstSaleMinDays,
    FirstSaleMaxDays,
    FirstSaleExpectedDays,
    FirstSaleWithAdsExpectedDays,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("source_platform"))
                    .values(vec![Alias::new("aliexpress"), Alias::new("alibaba")])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("analysis_verdict"))
                    .values(vec![
                        Alias::new("launch"),
                        Alias::new("test"),
                        Alias::new("avoid"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Products::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Products::UserId).uuid().not_null())
                    .col(ColumnDef::new(Products::SourceUrl).text().not_null())
                    .col(
                        ColumnDef::new(Products::SourcePlatform)
                            .custom(Alias::new("source_platform"))
                            .not_null(),
                    )
                    .col(ColumnDef::new(Products::Title).string_len(500).not_null())
                    .col(ColumnDef::new(Products::PriceCents).big_integer().null())
                    .col(ColumnDef::new(Products::ImageUrl).text().null())
                    .col(ColumnDef::new(Products::Niche).string_len(100).null())
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_products_user")
                            .from(Products::Table, Products::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProductAnalyses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductAnalyses::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProductAnalyses::ProductId).uuid().not_null())
                    .col(ColumnDef::new(ProductAnalyses::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(ProductAnalyses::Verdict)
                            .custom(Alias::new("analysis_verdict"))
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductAnalyses::CompetitionScore)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductAnalyses::SaturationScore)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductAnalyses::LaunchPotentialScore)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductAnalyses::MarketingAngles)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductAnalyses::Summary).text().not_null())
                    .col(
                        ColumnDef::new(ProductAnalyses::FirstSaleMinDays)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductAnalyses::FirstSaleMaxDays)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductAnalyses::FirstSaleExpectedDays)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductAnalyses::FirstSaleWithAdsExpectedDays)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductAnalyses::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_product_analyses_product")
                            .from(ProductAnalyses::Table, ProductAnalyses::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_product_analyses_user")
                            .from(ProductAnalyses::Table, ProductAnalyses::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_product_analyses_user_created")
                    .table(ProductAnalyses::Table)
                    .col(ProductAnalyses::UserId)
                    .col(ProductAnalyses::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(ProductAnalyses::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Products::Table).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("analysis_verdict")).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("source_platform")).to_owned())
            .await?;
        Ok(())
    }
}
