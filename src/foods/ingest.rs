//! Normalization of raw upstream payloads into store records, and the
//! ingest operations that persist them.
//!
//! Re-ingesting the same logical payload is idempotent end to end: the
//! food row upserts on its key, child rows are replaced under the same
//! transaction, and surrogate ids stay stable.

use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::foods::dto::{
    AltMeasureRecord, CommonFoodPayload, CommonFoodRecord, NutrientFoodPayload,
    NutrientFoodRecord, NutrientValueRecord,
};
use crate::foods::fingerprint::{self, FingerprintInput};
use crate::foods::repo;

/// Substituted for a missing upstream `seq` so the composite key
/// (food_id, measure, seq_key) stays well-defined.
pub const SEQ_SENTINEL: i32 = -1;

/// Normalize one instant-search `common` entry. The original payload is
/// kept verbatim for later re-derivation.
pub fn normalize_common(raw: Value) -> ApiResult<CommonFoodRecord> {
    let p: CommonFoodPayload = serde_json::from_value(raw.clone())
        .map_err(|e| ApiError::Validation(format!("malformed common food payload: {e}")))?;

    let tag_id = p
        .tag_id
        .ok_or_else(|| ApiError::Validation("common food is missing tag_id".into()))?;
    let tag_name = p
        .tag_name
        .or_else(|| p.food_name.clone())
        .ok_or_else(|| ApiError::Validation("common food is missing tag_name/food_name".into()))?;

    Ok(CommonFoodRecord {
        tag_id,
        tag_name,
        food_name: p.food_name,
        serving_qty: p.serving_qty,
        serving_unit: p.serving_unit,
        nf_calories: p.nf_calories,
        locale: p.locale,
        photo_thumb_url: p.photo.and_then(|ph| ph.thumb),
        raw_payload: raw,
    })
}

/// Normalize one natural-nutrients `foods` entry, computing its
/// fingerprint and the child rows. Alt measures without a measure name
/// and nutrient entries without an attr_id are dropped, as upstream
/// occasionally emits them.
pub fn normalize_nutrient(raw: Value) -> ApiResult<NutrientFoodRecord> {
    let p: NutrientFoodPayload = serde_json::from_value(raw.clone())
        .map_err(|e| ApiError::Validation(format!("malformed nutrient food payload: {e}")))?;

    let food_name = p
        .food_name
        .ok_or_else(|| ApiError::Validation("nutrient food is missing food_name".into()))?;

    let fingerprint = fingerprint::compute(&FingerprintInput {
        food_name: Some(&food_name),
        brand_name: p.brand_name.as_deref(),
        serving_unit: p.serving_unit.as_deref(),
        serving_qty: p.serving_qty,
        upc: p.upc.as_deref(),
        ndb_no: p.ndb_no,
    });

    let alt_measures = p
        .alt_measures
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| {
            let measure = m.measure?;
            Some(AltMeasureRecord {
                measure,
                qty: m.qty,
                seq: m.seq,
                seq_key: m.seq.unwrap_or(SEQ_SENTINEL),
                serving_weight: m.serving_weight,
            })
        })
        .collect();

    let nutrient_values = p
        .full_nutrients
        .unwrap_or_default()
        .into_iter()
        .filter_map(|n| {
            Some(NutrientValueRecord {
                attr_id: n.attr_id?,
                value: n.value,
            })
        })
        .collect();

    let (photo, tags, meta) = (
        p.photo.unwrap_or_default(),
        p.tags.unwrap_or_default(),
        p.metadata.unwrap_or_default(),
    );

    Ok(NutrientFoodRecord {
        fingerprint,
        upc: p.upc,
        ndb_no: p.ndb_no,
        nix_brand_id: p.nix_brand_id,
        nix_item_id: p.nix_item_id,
        food_name,
        brand_name: p.brand_name,
        serving_qty: p.serving_qty,
        serving_unit: p.serving_unit,
        serving_weight_grams: p.serving_weight_grams,
        nf_calories: p.nf_calories,
        nf_total_fat: p.nf_total_fat,
        nf_saturated_fat: p.nf_saturated_fat,
        nf_cholesterol: p.nf_cholesterol,
        nf_sodium: p.nf_sodium,
        nf_total_carbohydrate: p.nf_total_carbohydrate,
        nf_dietary_fiber: p.nf_dietary_fiber,
        nf_sugars: p.nf_sugars,
        nf_protein: p.nf_protein,
        nf_potassium: p.nf_potassium,
        nf_p: p.nf_p,
        consumed_at: p.consumed_at,
        meal_type: p.meal_type,
        source: p.source,
        photo_thumb_url: photo.thumb,
        photo_highres_url: photo.highres,
        tag_item: tags.item,
        tag_measure: tags.measure,
        tag_quantity: tags.quantity,
        tag_food_group: tags.food_group,
        tag_id: tags.tag_id,
        is_raw_food: meta.is_raw_food,
        raw_payload: raw,
        alt_measures,
        nutrient_values,
    })
}

/// Upsert a batch of instant-search entries. Returns how many rows were
/// written. The whole batch normalizes before anything is written and
/// commits in one transaction, so a failed batch leaves no trace.
pub async fn ingest_common(db: &PgPool, items: Vec<Value>) -> ApiResult<u64> {
    let records = items
        .into_iter()
        .map(normalize_common)
        .collect::<ApiResult<Vec<_>>>()?;

    let mut tx = db.begin().await?;
    for record in &records {
        repo::upsert_common_food(&mut tx, record).await?;
    }
    tx.commit().await?;

    let upserted = records.len() as u64;
    debug!(upserted, "ingested common foods");
    Ok(upserted)
}

/// Upsert a batch of natural-nutrients entries. Normalization of every
/// food happens before the transaction opens and all foods plus their
/// child rows commit together: an error anywhere rolls back the whole
/// batch. The returned ids are stable across re-ingest of the same
/// fingerprint.
pub async fn ingest_nutrients(db: &PgPool, foods: Vec<Value>) -> ApiResult<Vec<i64>> {
    let records = foods
        .into_iter()
        .map(normalize_nutrient)
        .collect::<ApiResult<Vec<_>>>()?;

    let mut tx = db.begin().await?;
    let mut ids = Vec::with_capacity(records.len());
    for record in &records {
        let food_id = repo::upsert_nutrient_food(&mut tx, record).await?;
        repo::replace_alt_measures(&mut tx, food_id, &record.alt_measures).await?;
        repo::replace_nutrient_values(&mut tx, food_id, &record.nutrient_values).await?;

        debug!(food_id, fingerprint = %record.fingerprint, "ingested nutrient food");
        ids.push(food_id);
    }
    tx.commit().await?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nutrient_payload() -> Value {
        json!({
            "food_name": "Cheddar Cheese",
            "brand_name": null,
            "serving_qty": 1,
            "serving_unit": "slice",
            "serving_weight_grams": 28,
            "nf_calories": 113.12,
            "nf_protein": 6.97,
            "photo": {"thumb": "https://img.example/thumb.jpg", "highres": null},
            "tags": {"item": "cheddar cheese", "measure": null, "quantity": "1.0",
                     "food_group": 1, "tag_id": 379},
            "metadata": {"is_raw_food": false},
            "alt_measures": [
                {"serving_weight": 28, "measure": "slice", "seq": 1, "qty": 1},
                {"serving_weight": 132, "measure": "cup, diced", "seq": null, "qty": 1},
                {"serving_weight": 17, "qty": 1, "measure": null}
            ],
            "full_nutrients": [
                {"attr_id": 301, "value": 199.4},
                {"value": 0.1},
                {"attr_id": 203, "value": 6.97}
            ]
        })
    }

    #[test]
    fn normalize_nutrient_extracts_nested_fields() {
        let rec = normalize_nutrient(nutrient_payload()).unwrap();
        assert_eq!(rec.food_name, "Cheddar Cheese");
        assert_eq!(rec.photo_thumb_url.as_deref(), Some("https://img.example/thumb.jpg"));
        assert_eq!(rec.tag_item.as_deref(), Some("cheddar cheese"));
        assert_eq!(rec.tag_id, Some(379));
        assert_eq!(rec.is_raw_food, Some(false));
        assert_eq!(rec.raw_payload["nf_calories"], json!(113.12));
    }

    #[test]
    fn missing_seq_gets_the_sentinel_key() {
        let rec = normalize_nutrient(nutrient_payload()).unwrap();
        // the measure-less entry is dropped, the seq-less one keyed by the sentinel
        assert_eq!(rec.alt_measures.len(), 2);
        assert_eq!(rec.alt_measures[0].seq_key, 1);
        assert_eq!(rec.alt_measures[1].seq, None);
        assert_eq!(rec.alt_measures[1].seq_key, SEQ_SENTINEL);
    }

    #[test]
    fn nutrient_entries_without_attr_id_are_dropped() {
        let rec = normalize_nutrient(nutrient_payload()).unwrap();
        let attrs: Vec<i32> = rec.nutrient_values.iter().map(|n| n.attr_id).collect();
        assert_eq!(attrs, vec![301, 203]);
    }

    #[test]
    fn missing_food_name_is_a_validation_error() {
        let err = normalize_nutrient(json!({"brand_name": "Acme"})).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn same_logical_food_gets_the_same_fingerprint() {
        let a = normalize_nutrient(nutrient_payload()).unwrap();
        let mut other = nutrient_payload();
        other["nf_calories"] = json!(999.0); // non-identifying field
        other["food_name"] = json!("  CHEDDAR CHEESE ");
        let b = normalize_nutrient(other).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn normalize_common_falls_back_to_food_name() {
        let rec = normalize_common(json!({"tag_id": "11", "food_name": "eggs"})).unwrap();
        assert_eq!(rec.tag_id, 11);
        assert_eq!(rec.tag_name, "eggs");
    }

    #[test]
    fn normalize_common_requires_tag_id() {
        let err = normalize_common(json!({"tag_name": "eggs"})).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
