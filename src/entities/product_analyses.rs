use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "analysis_verdict")]
#[serde(rename_all = "snake_case")]
pub enum AnalysisVerdict {
    #[sea_orm(string_value = "launch")]
    Launch,
    #[sea_orm(string_value = "test")]
    Test,
    #[sea_orm(string_value = "avoid")]
    Avoid,
}

impl std::fmt::Display for AnalysisVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisVerdict::Launch => write!(f, "launch"),
            AnalysisVerdict::Test => write!(f, "test"),
            AnalysisVerdict::Avoid => write!(f, "avoid"),
        }
    }
}

// f64 columns rule out `Eq`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "product_analyses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub verdict: AnalysisVerdict,
    pub competition_score: f64,
    pub saturation_score: f64,
    pub launch_potential_score: f64,
    pub marketing_angles: Json,
    pub summary: String,
    pub first_sale_min_days: i32,
    pub first_sale_max_days: i32,
    pub first_sale_expected_days: i32,
    pub first_sale_with_ads_expected_days: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
