//! Parameterized upsert/query statements over the food tables.
//!
//! Every upsert is atomic on its composite key via ON CONFLICT, so two
//! concurrent ingests of the same key cannot produce duplicate rows and
//! no application-level locking is needed. Errors come back as raw
//! `sqlx::Error` so the error layer can classify constraint violations.

use sqlx::{PgPool, Postgres, Transaction};

use crate::foods::dto::{
    AltMeasureRecord, AltMeasureRow, CommonFoodHit, CommonFoodRecord, CommonFoodRow,
    NutrientFoodHit, NutrientFoodRecord, NutrientFoodRow, NutrientValueRecord, NutrientValueRow,
};

const COMMON_FOOD_COLS: &str = "tag_id, tag_name, food_name, serving_qty, serving_unit, \
     nf_calories, locale, photo_thumb_url, raw_payload, updated_at";

const NUTRIENT_FOOD_COLS: &str = "id, fingerprint, upc, ndb_no, nix_brand_id, nix_item_id, \
     food_name, brand_name, serving_qty, serving_unit, serving_weight_grams, \
     nf_calories, nf_total_fat, nf_saturated_fat, nf_cholesterol, nf_sodium, \
     nf_total_carbohydrate, nf_dietary_fiber, nf_sugars, nf_protein, nf_potassium, nf_p, \
     consumed_at, meal_type, source, photo_thumb_url, photo_highres_url, \
     tag_item, tag_measure, tag_quantity, tag_food_group, tag_id, \
     is_raw_food, raw_payload, updated_at";

// ---- writes ----

/// Insert or overwrite the search entry for a tag, refreshing its
/// modification timestamp. Fully idempotent.
pub async fn upsert_common_food(
    tx: &mut Transaction<'_, Postgres>,
    rec: &CommonFoodRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO common_food (
            tag_id, tag_name, food_name, serving_qty, serving_unit,
            nf_calories, locale, photo_thumb_url, raw_payload, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
        ON CONFLICT (tag_id) DO UPDATE SET
            tag_name        = EXCLUDED.tag_name,
            food_name       = EXCLUDED.food_name,
            serving_qty     = EXCLUDED.serving_qty,
            serving_unit    = EXCLUDED.serving_unit,
            nf_calories     = EXCLUDED.nf_calories,
            locale          = EXCLUDED.locale,
            photo_thumb_url = EXCLUDED.photo_thumb_url,
            raw_payload     = EXCLUDED.raw_payload,
            updated_at      = now()
        "#,
    )
    .bind(rec.tag_id)
    .bind(&rec.tag_name)
    .bind(&rec.food_name)
    .bind(rec.serving_qty)
    .bind(&rec.serving_unit)
    .bind(rec.nf_calories)
    .bind(&rec.locale)
    .bind(&rec.photo_thumb_url)
    .bind(&rec.raw_payload)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Insert a nutrient food, or update the row sharing its fingerprint.
/// The surrogate id is preserved on conflict so existing child rows and
/// mappings stay attached.
pub async fn upsert_nutrient_food(
    tx: &mut Transaction<'_, Postgres>,
    rec: &NutrientFoodRecord,
) -> Result<i64, sqlx::Error> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO nutrient_food (
            fingerprint, upc, ndb_no, nix_brand_id, nix_item_id,
            food_name, brand_name, serving_qty, serving_unit, serving_weight_grams,
            nf_calories, nf_total_fat, nf_saturated_fat, nf_cholesterol, nf_sodium,
            nf_total_carbohydrate, nf_dietary_fiber, nf_sugars, nf_protein,
            nf_potassium, nf_p,
            consumed_at, meal_type, source,
            photo_thumb_url, photo_highres_url,
            tag_item, tag_measure, tag_quantity, tag_food_group, tag_id,
            is_raw_food, raw_payload, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5,
            $6, $7, $8, $9, $10,
            $11, $12, $13, $14, $15,
            $16, $17, $18, $19,
            $20, $21,
            $22, $23, $24,
            $25, $26,
            $27, $28, $29, $30, $31,
            $32, $33, now()
        )
        ON CONFLICT (fingerprint) DO UPDATE SET
            upc                   = EXCLUDED.upc,
            ndb_no                = EXCLUDED.ndb_no,
            nix_brand_id          = EXCLUDED.nix_brand_id,
            nix_item_id           = EXCLUDED.nix_item_id,
            food_name             = EXCLUDED.food_name,
            brand_name            = EXCLUDED.brand_name,
            serving_qty           = EXCLUDED.serving_qty,
            serving_unit          = EXCLUDED.serving_unit,
            serving_weight_grams  = EXCLUDED.serving_weight_grams,
            nf_calories           = EXCLUDED.nf_calories,
            nf_total_fat          = EXCLUDED.nf_total_fat,
            nf_saturated_fat      = EXCLUDED.nf_saturated_fat,
            nf_cholesterol        = EXCLUDED.nf_cholesterol,
            nf_sodium             = EXCLUDED.nf_sodium,
            nf_total_carbohydrate = EXCLUDED.nf_total_carbohydrate,
            nf_dietary_fiber      = EXCLUDED.nf_dietary_fiber,
            nf_sugars             = EXCLUDED.nf_sugars,
            nf_protein            = EXCLUDED.nf_protein,
            nf_potassium          = EXCLUDED.nf_potassium,
            nf_p                  = EXCLUDED.nf_p,
            consumed_at           = EXCLUDED.consumed_at,
            meal_type             = EXCLUDED.meal_type,
            source                = EXCLUDED.source,
            photo_thumb_url       = EXCLUDED.photo_thumb_url,
            photo_highres_url     = EXCLUDED.photo_highres_url,
            tag_item              = EXCLUDED.tag_item,
            tag_measure           = EXCLUDED.tag_measure,
            tag_quantity          = EXCLUDED.tag_quantity,
            tag_food_group        = EXCLUDED.tag_food_group,
            tag_id                = EXCLUDED.tag_id,
            is_raw_food           = EXCLUDED.is_raw_food,
            raw_payload           = EXCLUDED.raw_payload,
            updated_at            = now()
        RETURNING id
        "#,
    )
    .bind(&rec.fingerprint)
    .bind(&rec.upc)
    .bind(rec.ndb_no)
    .bind(&rec.nix_brand_id)
    .bind(&rec.nix_item_id)
    .bind(&rec.food_name)
    .bind(&rec.brand_name)
    .bind(rec.serving_qty)
    .bind(&rec.serving_unit)
    .bind(rec.serving_weight_grams)
    .bind(rec.nf_calories)
    .bind(rec.nf_total_fat)
    .bind(rec.nf_saturated_fat)
    .bind(rec.nf_cholesterol)
    .bind(rec.nf_sodium)
    .bind(rec.nf_total_carbohydrate)
    .bind(rec.nf_dietary_fiber)
    .bind(rec.nf_sugars)
    .bind(rec.nf_protein)
    .bind(rec.nf_potassium)
    .bind(rec.nf_p)
    .bind(rec.consumed_at)
    .bind(&rec.meal_type)
    .bind(&rec.source)
    .bind(&rec.photo_thumb_url)
    .bind(&rec.photo_highres_url)
    .bind(&rec.tag_item)
    .bind(&rec.tag_measure)
    .bind(&rec.tag_quantity)
    .bind(&rec.tag_food_group)
    .bind(rec.tag_id)
    .bind(rec.is_raw_food)
    .bind(&rec.raw_payload)
    .fetch_one(&mut **tx)
    .await?;
    Ok(id)
}

/// Replace a food's alternate measures with the incoming set, keyed by
/// (food_id, measure, seq_key). Stale rows from an earlier ingest do
/// not survive.
pub async fn replace_alt_measures(
    tx: &mut Transaction<'_, Postgres>,
    food_id: i64,
    measures: &[AltMeasureRecord],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM nutrient_alt_measure WHERE food_id = $1")
        .bind(food_id)
        .execute(&mut **tx)
        .await?;

    for m in measures {
        sqlx::query(
            r#"
            INSERT INTO nutrient_alt_measure (food_id, measure, qty, seq, seq_key, serving_weight)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (food_id, measure, seq_key) DO UPDATE SET
                qty            = EXCLUDED.qty,
                seq            = EXCLUDED.seq,
                serving_weight = EXCLUDED.serving_weight
            "#,
        )
        .bind(food_id)
        .bind(&m.measure)
        .bind(m.qty)
        .bind(m.seq)
        .bind(m.seq_key)
        .bind(m.serving_weight)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Replace a food's sparse nutrient values, keyed by (food_id, attr_id).
pub async fn replace_nutrient_values(
    tx: &mut Transaction<'_, Postgres>,
    food_id: i64,
    values: &[NutrientValueRecord],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM nutrient_value WHERE food_id = $1")
        .bind(food_id)
        .execute(&mut **tx)
        .await?;

    for v in values {
        sqlx::query(
            r#"
            INSERT INTO nutrient_value (food_id, attr_id, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (food_id, attr_id) DO UPDATE SET
                value = EXCLUDED.value
            "#,
        )
        .bind(food_id)
        .bind(v.attr_id)
        .bind(v.value)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Idempotent association of a search entry with a detailed record.
/// Cleanup is left to the cascades, never done explicitly.
pub async fn link_common_to_nutrient(
    db: &PgPool,
    tag_id: i64,
    nutrient_food_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO common_to_nutrient_map (tag_id, nutrient_food_id)
        VALUES ($1, $2)
        ON CONFLICT (tag_id, nutrient_food_id) DO NOTHING
        "#,
    )
    .bind(tag_id)
    .bind(nutrient_food_id)
    .execute(db)
    .await?;
    Ok(())
}

/// Delete a nutrient food; alt measures, nutrient values and mappings
/// go with it via the cascades. Returns false when the id is unknown.
pub async fn delete_nutrient_food(db: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM nutrient_food WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

// ---- reads ----

/// LIKE treats `%`, `_` and `\` as metacharacters; the query is meant
/// as a literal substring, so escape them before binding.
fn escape_like(q: &str) -> String {
    q.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Case-insensitive substring search over tag names, ranked by trigram
/// similarity. Ranking uses the raw query; matching the escaped one.
pub async fn search_common_by_name(
    db: &PgPool,
    q: &str,
    limit: i64,
) -> Result<Vec<CommonFoodHit>, sqlx::Error> {
    sqlx::query_as::<_, CommonFoodHit>(
        r#"
        SELECT tag_id, tag_name, food_name, nf_calories, photo_thumb_url,
               similarity(lower(tag_name), lower($1)) AS rank
          FROM common_food
         WHERE lower(tag_name) LIKE '%' || lower($2) || '%' ESCAPE '\'
         ORDER BY rank DESC, tag_id
         LIMIT $3
        "#,
    )
    .bind(q)
    .bind(escape_like(q))
    .bind(limit)
    .fetch_all(db)
    .await
}

pub async fn search_nutrient_by_name(
    db: &PgPool,
    q: &str,
    limit: i64,
) -> Result<Vec<NutrientFoodHit>, sqlx::Error> {
    sqlx::query_as::<_, NutrientFoodHit>(
        r#"
        SELECT id, food_name, brand_name, nf_calories,
               similarity(lower(food_name), lower($1)) AS rank
          FROM nutrient_food
         WHERE lower(food_name) LIKE '%' || lower($2) || '%' ESCAPE '\'
         ORDER BY rank DESC, id
         LIMIT $3
        "#,
    )
    .bind(q)
    .bind(escape_like(q))
    .bind(limit)
    .fetch_all(db)
    .await
}

/// Exact-match lookup via the dedicated upc index. A upc can legitimately
/// map to several fingerprints, hence the Vec.
pub async fn find_by_upc(db: &PgPool, upc: &str) -> Result<Vec<NutrientFoodRow>, sqlx::Error> {
    let sql = format!("SELECT {NUTRIENT_FOOD_COLS} FROM nutrient_food WHERE upc = $1 ORDER BY id");
    sqlx::query_as::<_, NutrientFoodRow>(&sql)
        .bind(upc)
        .fetch_all(db)
        .await
}

pub async fn find_by_ndb_no(db: &PgPool, ndb_no: i64) -> Result<Vec<NutrientFoodRow>, sqlx::Error> {
    let sql =
        format!("SELECT {NUTRIENT_FOOD_COLS} FROM nutrient_food WHERE ndb_no = $1 ORDER BY id");
    sqlx::query_as::<_, NutrientFoodRow>(&sql)
        .bind(ndb_no)
        .fetch_all(db)
        .await
}

/// A food plus both of its child collections, or None for an unknown id.
pub async fn get_nutrient_food(
    db: &PgPool,
    id: i64,
) -> Result<Option<(NutrientFoodRow, Vec<AltMeasureRow>, Vec<NutrientValueRow>)>, sqlx::Error> {
    let sql = format!("SELECT {NUTRIENT_FOOD_COLS} FROM nutrient_food WHERE id = $1");
    let Some(food) = sqlx::query_as::<_, NutrientFoodRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
    else {
        return Ok(None);
    };

    let measures = sqlx::query_as::<_, AltMeasureRow>(
        r#"
        SELECT food_id, measure, qty, seq, seq_key, serving_weight
          FROM nutrient_alt_measure
         WHERE food_id = $1
         ORDER BY seq_key, measure
        "#,
    )
    .bind(id)
    .fetch_all(db)
    .await?;

    let values = sqlx::query_as::<_, NutrientValueRow>(
        r#"
        SELECT food_id, attr_id, value
          FROM nutrient_value
         WHERE food_id = $1
         ORDER BY attr_id
        "#,
    )
    .bind(id)
    .fetch_all(db)
    .await?;

    Ok(Some((food, measures, values)))
}

/// Search entries that have no detailed record mapped yet, newest first.
/// Feeds an external hydration worker.
pub async fn list_unmapped_common(
    db: &PgPool,
    limit: i64,
) -> Result<Vec<CommonFoodRow>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {cols}
          FROM common_food cf
          LEFT JOIN common_to_nutrient_map m ON m.tag_id = cf.tag_id
         WHERE m.tag_id IS NULL
         ORDER BY cf.updated_at DESC
         LIMIT $1
        "#,
        cols = COMMON_FOOD_COLS
            .split(", ")
            .map(|c| format!("cf.{c}"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    sqlx::query_as::<_, CommonFoodRow>(&sql)
        .bind(limit)
        .fetch_all(db)
        .await
}
