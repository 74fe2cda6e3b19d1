use crate::entities::{
    AnalysisVerdict, SourcePlatform, product_analysis_entity as analyses,
    product_entity as products,
};
use crate::utils::FirstSaleEstimate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateAnalysisRequest {
    #[schema(example = "https://www.aliexpress.com/item/1005006.html")]
    pub source_url: String,
    #[schema(example = "Minimalist moon lamp")]
    pub title: String,
    pub price_cents: Option<i64>,
    pub image_url: Option<String>,
    #[schema(example = "home decor")]
    pub niche: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub source_url: String,
    pub source_platform: SourcePlatform,
    pub title: String,
    pub price_cents: Option<i64>,
    pub image_url: Option<String>,
    pub niche: Option<String>,
}

impl From<products::Model> for ProductResponse {
    fn from(p: products::Model) -> Self {
        Self {
            id: p.id,
            source_url: p.source_url,
            source_platform: p.source_platform,
            title: p.title,
            price_cents: p.price_cents,
            image_url: p.image_url,
            niche: p.niche,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResponse {
    pub id: Uuid,
    pub product: ProductResponse,
    pub verdict: AnalysisVerdict,
    pub competition_score: f64,
    pub saturation_score: f64,
    pub launch_potential_score: f64,
    pub marketing_angles: Vec<String>,
    pub summary: String,
    pub time_to_first_sale: FirstSaleEstimate,
    pub time_to_first_sale_with_ads_days: i32,
    pub created_at: DateTime<Utc>,
}

impl AnalysisResponse {
    pub fn new(analysis: analyses::Model, product: products::Model) -> Self {
        let marketing_angles = serde_json::from_value::<Vec<String>>(analysis.marketing_angles)
            .unwrap_or_default();
        Self {
            id: analysis.id,
            product: ProductResponse::from(product),
            verdict: analysis.verdict,
            competition_score: analysis.competition_score,
            saturation_score: analysis.saturation_score,
            launch_potential_score: analysis.launch_potential_score,
            marketing_angles,
            summary: analysis.summary,
            time_to_first_sale: FirstSaleEstimate {
                min_days: analysis.first_sale_min_days,
                max_days: analysis.first_sale_max_days,
                expected_days: analysis.first_sale_expected_days,
            },
            time_to_first_sale_with_ads_days: analysis.first_sale_with_ads_expected_days,
            created_at: analysis.created_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct FirstSaleQuery {
    /// Launch potential score, 0-10.
    pub score: f64,
    /// Assume paid ads are running.
    #[serde(default)]
    pub ads: bool,
}
