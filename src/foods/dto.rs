//! Wire payload shapes, normalized records, and row/response types.
//!
//! Payload structs mirror the upstream nutrition API JSON and are
//! deserialized leniently (ids sometimes arrive as strings, numeric
//! fields as either). The full original payload is always kept
//! verbatim alongside the normalized columns.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use time::OffsetDateTime;

// ---- upstream payload shapes ----

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Photo {
    pub thumb: Option<String>,
    pub highres: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tags {
    pub item: Option<String>,
    pub measure: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub quantity: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub food_group: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub tag_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    pub is_raw_food: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AltMeasurePayload {
    pub measure: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub qty: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_i32")]
    pub seq: Option<i32>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub serving_weight: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NutrientValuePayload {
    #[serde(default, deserialize_with = "de_opt_i32")]
    pub attr_id: Option<i32>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub value: Option<f64>,
}

/// One entry of the instant-search `common` array.
#[derive(Debug, Clone, Deserialize)]
pub struct CommonFoodPayload {
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub tag_id: Option<i64>,
    pub tag_name: Option<String>,
    pub food_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub serving_qty: Option<f64>,
    pub serving_unit: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub nf_calories: Option<f64>,
    pub locale: Option<String>,
    #[serde(default)]
    pub photo: Option<Photo>,
}

/// One entry of the natural-nutrients `foods` array.
#[derive(Debug, Clone, Deserialize)]
pub struct NutrientFoodPayload {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub upc: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub ndb_no: Option<i64>,
    pub nix_brand_id: Option<String>,
    pub nix_item_id: Option<String>,

    pub food_name: Option<String>,
    pub brand_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub serving_qty: Option<f64>,
    pub serving_unit: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub serving_weight_grams: Option<f64>,

    #[serde(default, deserialize_with = "de_opt_f64")]
    pub nf_calories: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub nf_total_fat: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub nf_saturated_fat: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub nf_cholesterol: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub nf_sodium: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub nf_total_carbohydrate: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub nf_dietary_fiber: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub nf_sugars: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub nf_protein: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub nf_potassium: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub nf_p: Option<f64>,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub consumed_at: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub meal_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub source: Option<String>,

    #[serde(default)]
    pub photo: Option<Photo>,
    #[serde(default)]
    pub tags: Option<Tags>,
    #[serde(default)]
    pub metadata: Option<Metadata>,

    #[serde(default)]
    pub alt_measures: Option<Vec<AltMeasurePayload>>,
    #[serde(default)]
    pub full_nutrients: Option<Vec<NutrientValuePayload>>,
}

// ---- normalized records (what the store persists) ----

#[derive(Debug, Clone)]
pub struct CommonFoodRecord {
    pub tag_id: i64,
    pub tag_name: String,
    pub food_name: Option<String>,
    pub serving_qty: Option<f64>,
    pub serving_unit: Option<String>,
    pub nf_calories: Option<f64>,
    pub locale: Option<String>,
    pub photo_thumb_url: Option<String>,
    pub raw_payload: Value,
}

#[derive(Debug, Clone)]
pub struct NutrientFoodRecord {
    pub fingerprint: String,

    pub upc: Option<String>,
    pub ndb_no: Option<i64>,
    pub nix_brand_id: Option<String>,
    pub nix_item_id: Option<String>,

    pub food_name: String,
    pub brand_name: Option<String>,
    pub serving_qty: Option<f64>,
    pub serving_unit: Option<String>,
    pub serving_weight_grams: Option<f64>,

    pub nf_calories: Option<f64>,
    pub nf_total_fat: Option<f64>,
    pub nf_saturated_fat: Option<f64>,
    pub nf_cholesterol: Option<f64>,
    pub nf_sodium: Option<f64>,
    pub nf_total_carbohydrate: Option<f64>,
    pub nf_dietary_fiber: Option<f64>,
    pub nf_sugars: Option<f64>,
    pub nf_protein: Option<f64>,
    pub nf_potassium: Option<f64>,
    pub nf_p: Option<f64>,

    pub consumed_at: Option<OffsetDateTime>,
    pub meal_type: Option<String>,
    pub source: Option<String>,

    pub photo_thumb_url: Option<String>,
    pub photo_highres_url: Option<String>,

    pub tag_item: Option<String>,
    pub tag_measure: Option<String>,
    pub tag_quantity: Option<String>,
    pub tag_food_group: Option<String>,
    pub tag_id: Option<i64>,

    pub is_raw_food: Option<bool>,
    pub raw_payload: Value,

    pub alt_measures: Vec<AltMeasureRecord>,
    pub nutrient_values: Vec<NutrientValueRecord>,
}

#[derive(Debug, Clone)]
pub struct AltMeasureRecord {
    pub measure: String,
    pub qty: Option<f64>,
    /// Raw upstream sequence number, kept as-is.
    pub seq: Option<i32>,
    /// `seq`, or the sentinel when the payload omits one.
    pub seq_key: i32,
    pub serving_weight: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NutrientValueRecord {
    pub attr_id: i32,
    pub value: Option<f64>,
}

// ---- persisted rows ----

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommonFoodRow {
    pub tag_id: i64,
    pub tag_name: String,
    pub food_name: Option<String>,
    pub serving_qty: Option<f64>,
    pub serving_unit: Option<String>,
    pub nf_calories: Option<f64>,
    pub locale: Option<String>,
    pub photo_thumb_url: Option<String>,
    pub raw_payload: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Search result with a trigram similarity rank.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommonFoodHit {
    pub tag_id: i64,
    pub tag_name: String,
    pub food_name: Option<String>,
    pub nf_calories: Option<f64>,
    pub photo_thumb_url: Option<String>,
    pub rank: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NutrientFoodRow {
    pub id: i64,
    pub fingerprint: String,

    pub upc: Option<String>,
    pub ndb_no: Option<i64>,
    pub nix_brand_id: Option<String>,
    pub nix_item_id: Option<String>,

    pub food_name: String,
    pub brand_name: Option<String>,
    pub serving_qty: Option<f64>,
    pub serving_unit: Option<String>,
    pub serving_weight_grams: Option<f64>,

    pub nf_calories: Option<f64>,
    pub nf_total_fat: Option<f64>,
    pub nf_saturated_fat: Option<f64>,
    pub nf_cholesterol: Option<f64>,
    pub nf_sodium: Option<f64>,
    pub nf_total_carbohydrate: Option<f64>,
    pub nf_dietary_fiber: Option<f64>,
    pub nf_sugars: Option<f64>,
    pub nf_protein: Option<f64>,
    pub nf_potassium: Option<f64>,
    pub nf_p: Option<f64>,

    #[serde(with = "time::serde::rfc3339::option")]
    pub consumed_at: Option<OffsetDateTime>,
    pub meal_type: Option<String>,
    pub source: Option<String>,

    pub photo_thumb_url: Option<String>,
    pub photo_highres_url: Option<String>,

    pub tag_item: Option<String>,
    pub tag_measure: Option<String>,
    pub tag_quantity: Option<String>,
    pub tag_food_group: Option<String>,
    pub tag_id: Option<i64>,

    pub is_raw_food: Option<bool>,
    pub raw_payload: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NutrientFoodHit {
    pub id: i64,
    pub food_name: String,
    pub brand_name: Option<String>,
    pub nf_calories: Option<f64>,
    pub rank: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AltMeasureRow {
    pub food_id: i64,
    pub measure: String,
    pub qty: Option<f64>,
    pub seq: Option<i32>,
    pub seq_key: i32,
    pub serving_weight: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NutrientValueRow {
    pub food_id: i64,
    pub attr_id: i32,
    pub value: Option<f64>,
}

// ---- request / response ----

/// Body of `POST /foods/common`: the instant-search response verbatim.
#[derive(Debug, Deserialize)]
pub struct IngestCommonRequest {
    #[serde(default)]
    pub common: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct IngestCommonResponse {
    pub upserted: u64,
}

/// Body of `POST /foods/nutrients`: the natural-nutrients response verbatim.
#[derive(Debug, Deserialize)]
pub struct IngestNutrientsRequest {
    #[serde(default)]
    pub foods: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct IngestNutrientsResponse {
    pub ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub tag_id: i64,
    pub nutrient_food_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct NutrientFoodDetails {
    #[serde(flatten)]
    pub food: NutrientFoodRow,
    pub alt_measures: Vec<AltMeasureRow>,
    pub full_nutrients: Vec<NutrientValueRow>,
}

// ---- lenient deserializers ----

fn de_opt_i64<'de, D>(d: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

fn de_opt_i32<'de, D>(d: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_opt_i64(d)?.and_then(|n| i32::try_from(n).ok()))
}

fn de_opt_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn de_opt_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
