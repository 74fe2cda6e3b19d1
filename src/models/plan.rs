use crate::config::StripeConfig;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "subscription_plan")]
#[serde(rename_all = "UPPERCASE")]
pub enum Plan {
    #[sea_orm(string_value = "free")]
    Free,
    #[sea_orm(string_value = "smart")]
    Smart,
    #[sea_orm(string_value = "pro")]
    Pro,
    #[sea_orm(string_value = "scale")]
    Scale,
}

/// Monthly analysis quota per plan.
pub const PLAN_QUOTAS: [(Plan, i32); 4] = [
    (Plan::Free, 0),
    (Plan::Smart, 30),
    (Plan::Pro, 60),
    (Plan::Scale, 100),
];

impl Plan {
    pub const PAID: [Plan; 3] = [Plan::Smart, Plan::Pro, Plan::Scale];

    pub fn quota(self) -> i32 {
        PLAN_QUOTAS
            .iter()
            .find(|(p, _)| *p == self)
            .map(|(_, q)| *q)
            .unwrap_or(0)
    }

    pub fn monthly_price_cents(self) -> i64 {
        match self {
            Plan::Free => 0,
            Plan::Smart => 1999,
            Plan::Pro => 2999,
            Plan::Scale => 4999,
        }
    }

    pub fn is_paid(self) -> bool {
        self != Plan::Free
    }

    /// Position in the upgrade ladder.
    pub fn rank(self) -> u8 {
        match self {
            Plan::Free => 0,
            Plan::Smart => 1,
            Plan::Pro => 2,
            Plan::Scale => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "FREE",
            Plan::Smart => "SMART",
            Plan::Pro => "PRO",
            Plan::Scale => "SCALE",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "smart" => Ok(Plan::Smart),
            "pro" => Ok(Plan::Pro),
            "scale" => Ok(Plan::Scale),
            other => Err(format!("Unknown plan: {other}")),
        }
    }
}

/// Maps payment provider price identifiers to plans and back.
#[derive(Debug, Clone, Default)]
pub struct PriceCatalog {
    entries: Vec<(Plan, String)>,
}

impl PriceCatalog {
    pub fn new(entries: Vec<(Plan, String)>) -> Self {
        Self { entries }
    }

    pub fn from_config(config: &StripeConfig) -> Self {
        let entries = [
            (Plan::Smart, &config.smart_price_id),
            (Plan::Pro, &config.pro_price_id),
            (Plan::Scale, &config.scale_price_id),
        ]
        .into_iter()
        .filter_map(|(plan, id)| {
            id.as_ref()
                .filter(|s| !s.is_empty())
                .map(|s| (plan, s.clone()))
        })
        .collect();
        Self { entries }
    }

    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        self.entries
            .iter()
            .find(|(_, id)| id == price_id)
            .map(|(plan, _)| *plan)
    }

    pub fn price_for_plan(&self, plan: Plan) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| *p == plan)
            .map(|(_, id)| id.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlanResponse {
    pub plan: Plan,
    pub quota: i32,
    pub monthly_price_cents: i64,
    pub available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PriceCatalog {
        PriceCatalog::new(vec![
            (Plan::Smart, "price_smart".to_string()),
            (Plan::Pro, "price_pro".to_string()),
            (Plan::Scale, "price_scale".to_string()),
        ])
    }

    #[test]
    fn test_plan_quotas() {
        assert_eq!(Plan::Free.quota(), 0);
        assert_eq!(Plan::Smart.quota(), 30);
        assert_eq!(Plan::Pro.quota(), 60);
        assert_eq!(Plan::Scale.quota(), 100);
    }

    #[test]
    fn test_rank_is_monotonic_in_quota() {
        let mut plans = vec![Plan::Scale, Plan::Free, Plan::Pro, Plan::Smart];
        plans.sort_by_key(|p| p.rank());
        let quotas: Vec<i32> = plans.iter().map(|p| p.quota()).collect();
        assert!(quotas.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_parse_plan_case_insensitive() {
        assert_eq!("SMART".parse::<Plan>().unwrap(), Plan::Smart);
        assert_eq!("pro".parse::<Plan>().unwrap(), Plan::Pro);
        assert_eq!(" Scale ".parse::<Plan>().unwrap(), Plan::Scale);
        assert!("enterprise".parse::<Plan>().is_err());
    }

    #[test]
    fn test_price_mapping() {
        let catalog = catalog();
        assert_eq!(catalog.plan_for_price("price_pro"), Some(Plan::Pro));
        assert_eq!(catalog.plan_for_price("price_unknown"), None);
        assert_eq!(catalog.price_for_plan(Plan::Scale), Some("price_scale"));
        assert_eq!(catalog.price_for_plan(Plan::Free), None);
    }

    #[test]
    fn test_catalog_from_config_skips_missing_ids() {
        let config = StripeConfig {
            smart_price_id: Some("price_smart".into()),
            pro_price_id: Some(String::new()),
            scale_price_id: None,
            ..Default::default()
        };
        let catalog = PriceCatalog::from_config(&config);
        assert_eq!(catalog.price_for_plan(Plan::Smart), Some("price_smart"));
        assert_eq!(catalog.price_for_plan(Plan::Pro), None);
        assert_eq!(catalog.price_for_plan(Plan::Scale), None);
    }

    #[test]
    fn test_plan_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Plan::Smart).unwrap(), "\"SMART\"");
    }
}
