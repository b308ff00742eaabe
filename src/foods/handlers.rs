use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::dto::{
    CommonFoodHit, CommonFoodRow, IngestCommonRequest, IngestCommonResponse,
    IngestNutrientsRequest, IngestNutrientsResponse, LimitParams, LinkRequest,
    NutrientFoodDetails, NutrientFoodHit, NutrientFoodRow, SearchParams,
};
use super::{ingest, repo};

pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/foods/common/search", get(search_common))
        .route("/foods/common/unmapped", get(list_unmapped))
        .route("/foods/nutrients/search", get(search_nutrients))
        .route("/foods/nutrients/upc/:code", get(lookup_by_upc))
        .route("/foods/nutrients/ndb/:ndb_no", get(lookup_by_ndb))
        .route("/foods/nutrients/:id", get(get_nutrient_food))
}

pub fn write_router() -> Router<AppState> {
    Router::new()
        .route("/foods/common", post(ingest_common))
        .route("/foods/nutrients", post(ingest_nutrients))
        .route("/foods/links", post(link_common_to_nutrient))
        .route("/foods/nutrients/:id", delete(delete_nutrient_food))
}

// ---- ingest ----

#[instrument(skip(state, body), fields(items = body.common.len()))]
async fn ingest_common(
    State(state): State<AppState>,
    Json(body): Json<IngestCommonRequest>,
) -> ApiResult<Json<IngestCommonResponse>> {
    let upserted = ingest::ingest_common(&state.db, body.common).await?;
    Ok(Json(IngestCommonResponse { upserted }))
}

#[instrument(skip(state, body), fields(items = body.foods.len()))]
async fn ingest_nutrients(
    State(state): State<AppState>,
    Json(body): Json<IngestNutrientsRequest>,
) -> ApiResult<Json<IngestNutrientsResponse>> {
    let ids = ingest::ingest_nutrients(&state.db, body.foods).await?;
    Ok(Json(IngestNutrientsResponse { ids }))
}

#[instrument(skip(state))]
async fn link_common_to_nutrient(
    State(state): State<AppState>,
    Json(body): Json<LinkRequest>,
) -> ApiResult<StatusCode> {
    repo::link_common_to_nutrient(&state.db, body.tag_id, body.nutrient_food_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
async fn delete_nutrient_food(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if repo::delete_nutrient_food(&state.db, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("nutrient food {id}")))
    }
}

// ---- lookups ----

#[instrument(skip(state))]
async fn search_common(
    State(state): State<AppState>,
    Query(p): Query<SearchParams>,
) -> ApiResult<Json<Vec<CommonFoodHit>>> {
    let hits = repo::search_common_by_name(&state.db, &p.q, p.limit).await?;
    Ok(Json(hits))
}

#[instrument(skip(state))]
async fn search_nutrients(
    State(state): State<AppState>,
    Query(p): Query<SearchParams>,
) -> ApiResult<Json<Vec<NutrientFoodHit>>> {
    let hits = repo::search_nutrient_by_name(&state.db, &p.q, p.limit).await?;
    Ok(Json(hits))
}

#[instrument(skip(state))]
async fn list_unmapped(
    State(state): State<AppState>,
    Query(p): Query<LimitParams>,
) -> ApiResult<Json<Vec<CommonFoodRow>>> {
    let rows = repo::list_unmapped_common(&state.db, p.limit).await?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
async fn lookup_by_upc(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Vec<NutrientFoodRow>>> {
    let rows = repo::find_by_upc(&state.db, &code).await?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
async fn lookup_by_ndb(
    State(state): State<AppState>,
    Path(ndb_no): Path<i64>,
) -> ApiResult<Json<Vec<NutrientFoodRow>>> {
    let rows = repo::find_by_ndb_no(&state.db, ndb_no).await?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
async fn get_nutrient_food(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<NutrientFoodDetails>> {
    let (food, alt_measures, full_nutrients) = repo::get_nutrient_food(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("nutrient food {id}")))?;
    Ok(Json(NutrientFoodDetails {
        food,
        alt_measures,
        full_nutrients,
    }))
}
