//! The metered recommendation endpoint
//!
//! Quota is checked before any work and consumed only after the response has
//! been assembled and recorded, so a failed request never burns a credit.

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use sqlx::Row;
use uuid::Uuid;

use cropsense_engine::{
    enrich::fallback_for, score, top_items, CropItem, EnrichContext, RecommendRequest,
    RecommendResponse, ScoredCrop,
};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const TOP_N: usize = 3;

#[derive(Serialize)]
pub struct RecommendBody {
    #[serde(rename = "historyId")]
    pub history_id: Uuid,
    #[serde(flatten)]
    pub response: RecommendResponse,
}

pub async fn recommend(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<RecommendRequest>,
) -> ApiResult<Json<RecommendBody>> {
    let plan = state.quota.check(auth.user_id).await?;

    let ranked = score(req.soil_type, req.season, req.climate.as_ref());
    let top = top_items(&ranked, TOP_N);

    let ctx = EnrichContext {
        soil: req.soil_type,
        season: req.season,
        month: req.month,
        climate: req.climate,
    };
    let enriched = state.enricher.enrich(&top, &ctx).await;

    let items: Vec<CropItem> = top
        .iter()
        .map(|scored| assemble_item(scored, &enriched, &ctx))
        .collect();
    let response = RecommendResponse { items };

    let history_id = insert_history(&state, auth.user_id, &req, &response).await?;
    let used = state.quota.record_use(auth.user_id).await?;

    tracing::info!(
        user_id = %auth.user_id,
        plan = %plan.id,
        used = used,
        history_id = %history_id,
        "Recommendation served"
    );

    Ok(Json(RecommendBody {
        history_id,
        response,
    }))
}

/// Join scorer output with enrichment by crop name; crops the model skipped
/// get the deterministic fallback.
fn assemble_item(
    scored: &ScoredCrop,
    enriched: &[cropsense_engine::EnrichedCrop],
    ctx: &EnrichContext,
) -> CropItem {
    let extra = enriched
        .iter()
        .find(|e| e.crop.eq_ignore_ascii_case(&scored.crop))
        .cloned()
        .unwrap_or_else(|| fallback_for(scored, ctx));

    CropItem {
        crop: scored.crop.clone(),
        fit_score: scored.fit_score,
        duration_days: scored.duration_days,
        expected_yield_qpa: scored.expected_yield_qpa,
        explanation: extra.explanation,
        best_practices: extra.best_practices,
        market: extra.market,
        pest_disease: extra.pest_disease,
    }
}

async fn insert_history(
    state: &AppState,
    user_id: Uuid,
    request: &RecommendRequest,
    response: &RecommendResponse,
) -> ApiResult<Uuid> {
    let request_json = serde_json::to_value(request).map_err(|_| ApiError::Internal)?;
    let items_json = serde_json::to_value(&response.items).map_err(|_| ApiError::Internal)?;

    let row = sqlx::query(
        "INSERT INTO histories (user_id, request, items) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(user_id)
    .bind(request_json)
    .bind(items_json)
    .fetch_one(&state.pool)
    .await?;

    Ok(row.try_get("id")?)
}
