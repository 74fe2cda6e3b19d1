use crate::database::DbPool;
use crate::entities::{
    SourcePlatform, product_analysis_entity as analyses, product_entity as products,
};
use crate::error::{AppError, AppResult};
use crate::external::{OpenAiService, ProductBrief};
use crate::models::{AnalysisResponse, CreateAnalysisRequest, PaginatedResponse, PaginationParams};
use crate::services::QuotaService;
use crate::utils::{
    AuthUser, estimate_time_to_first_sale, estimate_time_to_first_sale_with_ads,
    validate_product_url,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

const MAX_TITLE_LEN: usize = 300;

#[derive(Clone)]
pub struct AnalysisService {
    pool: DbPool,
    quota: QuotaService,
    openai: OpenAiService,
}

fn validate_request(request: &CreateAnalysisRequest) -> AppResult<SourcePlatform> {
    let title = request.title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::ValidationError(format!(
            "Title must be between 1 and {MAX_TITLE_LEN} characters"
        )));
    }
    if request.price_cents.is_some_and(|p| p < 0) {
        return Err(AppError::ValidationError(
            "Price cannot be negative".to_string(),
        ));
    }
    validate_product_url(&request.source_url)
}

impl AnalysisService {
    pub fn new(pool: DbPool, quota: QuotaService, openai: OpenAiService) -> Self {
        Self {
            pool,
            quota,
            openai,
        }
    }

    /// Charges one credit and analyzes the product. The credit is returned
    /// when the analysis cannot be produced.
    pub async fn create(
        &self,
        auth: &AuthUser,
        request: CreateAnalysisRequest,
    ) -> AppResult<AnalysisResponse> {
        let platform = validate_request(&request)?;
        self.quota.deduct(auth, 1).await?;

        match self.analyze(auth.id, &request, platform).await {
            Ok(response) => Ok(response),
            Err(e) => {
                log::warn!("Analysis failed for user {}, refunding credit: {}", auth.id, e);
                if let Err(refund_err) = self.quota.refund(auth.id, 1).await {
                    log::error!("Refund failed for user {}: {}", auth.id, refund_err);
                }
                Err(e)
            }
        }
    }

    async fn analyze(
        &self,
        user_id: Uuid,
        request: &CreateAnalysisRequest,
        platform: SourcePlatform,
    ) -> AppResult<AnalysisResponse> {
        let now = Utc::now();
        let product = products::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            source_url: Set(request.source_url.trim().to_string()),
            source_platform: Set(platform),
            title: Set(request.title.trim().to_string()),
            price_cents: Set(request.price_cents),
            image_url: Set(request.image_url.clone()),
            niche: Set(request.niche.clone()),
            created_at: Set(Some(now)),
        }
        .insert(self.pool.as_ref())
        .await?;

        let brief = ProductBrief {
            title: &product.title,
            source_url: &product.source_url,
            price_cents: product.price_cents,
            niche: product.niche.as_deref(),
        };
        let verdict = match self.openai.analyze_product(&brief).await {
            Ok(verdict) => verdict,
            Err(e) => {
                if let Err(cleanup_err) = product.clone().delete(self.pool.as_ref()).await {
                    log::error!(
                        "Failed to remove product {} after analysis error: {}",
                        product.id,
                        cleanup_err
                    );
                }
                return Err(e);
            }
        };

        let organic = estimate_time_to_first_sale(verdict.launch_potential_score);
        let with_ads = estimate_time_to_first_sale_with_ads(verdict.launch_potential_score);

        let analysis = analyses::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            user_id: Set(user_id),
            verdict: Set(verdict.verdict),
            competition_score: Set(verdict.competition_score),
            saturation_score: Set(verdict.saturation_score),
            launch_potential_score: Set(verdict.launch_potential_score),
            marketing_angles: Set(serde_json::to_value(&verdict.marketing_angles)?),
            summary: Set(verdict.summary),
            first_sale_min_days: Set(organic.min_days),
            first_sale_max_days: Set(organic.max_days),
            first_sale_expected_days: Set(organic.expected_days),
            first_sale_with_ads_expected_days: Set(with_ads.expected_days),
            created_at: Set(Some(now)),
        }
        .insert(self.pool.as_ref())
        .await?;

        log::info!(
            "Analysis {} for product {} by user {}: {} ({} days)",
            analysis.id,
            product.id,
            user_id,
            analysis.verdict,
            analysis.first_sale_expected_days
        );
        Ok(AnalysisResponse::new(analysis, product))
    }

    /// Caller's analyses, newest first.
    pub async fn list(
        &self,
        auth: &AuthUser,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<AnalysisResponse>> {
        let total = analyses::Entity::find()
            .filter(analyses::Column::UserId.eq(auth.id))
            .count(self.pool.as_ref())
            .await?;

        let rows = analyses::Entity::find()
            .filter(analyses::Column::UserId.eq(auth.id))
            .order_by_desc(analyses::Column::CreatedAt)
            .offset(params.get_offset())
            .limit(params.page_size())
            .find_also_related(products::Entity)
            .all(self.pool.as_ref())
            .await?;

        let data = rows
            .into_iter()
            .filter_map(|(analysis, product)| {
                product.map(|product| AnalysisResponse::new(analysis, product))
            })
            .collect();

        Ok(PaginatedResponse::new(data, params, total))
    }

    async fn find_owned(
        &self,
        auth: &AuthUser,
        id: Uuid,
    ) -> AppResult<(analyses::Model, products::Model)> {
        let row = analyses::Entity::find_by_id(id)
            .filter(analyses::Column::UserId.eq(auth.id))
            .find_also_related(products::Entity)
            .one(self.pool.as_ref())
            .await?;

        match row {
            Some((analysis, Some(product))) => Ok((analysis, product)),
            _ => Err(AppError::NotFound("Analysis not found".to_string())),
        }
    }

    pub async fn get(&self, auth: &AuthUser, id: Uuid) -> AppResult<AnalysisResponse> {
        let (analysis, product) = self.find_owned(auth, id).await?;
        Ok(AnalysisResponse::new(analysis, product))
    }

    /// Deletes the analysis together with its product.
    pub async fn delete(&self, auth: &AuthUser, id: Uuid) -> AppResult<()> {
        let (_, product) = self.find_owned(auth, id).await?;
        products::Entity::delete_by_id(product.id)
            .exec(self.pool.as_ref())
            .await?;
        log::info!("User {} deleted analysis {id}", auth.id);
        Ok(())
    }
}
