//! Many-to-many relation synchronization
//!
//! Amenity and proximity sets are full-replace: the incoming set entirely
//! supersedes the stored one. Input arrives in whatever shape the frontend
//! produced (raw ids, wrapper objects, unit-suffixed distance strings);
//! malformed entries are dropped rather than aborting the whole operation.
//! Both syncs run inside the caller's transaction, the same one as the core
//! field write.

use crate::error::{UpdateError, UpdateResult};
use crate::normalize::{extract_id, normalize_id_set, normalize_string};
use imob_common::db::ProximityLink;
use serde_json::Value;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};

/// Parse an amenity payload into a sorted, deduplicated id set.
pub fn parse_amenity_ids(value: &Value) -> Vec<i64> {
    normalize_id_set(value)
}

/// Parse a proximity payload into link records. Entries without a numeric
/// id are dropped; duplicate ids collapse to the first occurrence; output
/// is sorted by id.
pub fn parse_proximity_records(value: &Value) -> Vec<ProximityLink> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    let mut records: Vec<ProximityLink> = Vec::with_capacity(items.len());
    for item in items {
        let Some(id) = extract_id(item) else {
            warn!(entry = %item, "Dropping proximity entry without a numeric id");
            continue;
        };
        if records.iter().any(|r| r.proximidade_fk == id) {
            continue;
        }

        let (distancia, tempo, observacoes) = match item {
            Value::Object(obj) => (
                obj.get("distancia_metros")
                    .or_else(|| obj.get("distancia"))
                    .and_then(parse_distance_meters),
                obj.get("tempo_caminhada").and_then(parse_walk_minutes),
                obj.get("observacoes").and_then(normalize_string),
            ),
            _ => (None, None, None),
        };

        records.push(ProximityLink {
            proximidade_fk: id,
            distancia_metros: distancia,
            tempo_caminhada: tempo,
            observacoes,
        });
    }

    records.sort_by_key(|r| r.proximidade_fk);
    records
}

/// Normalize a distance value to integer meters. Numbers are taken as
/// meters; strings may carry a `km` suffix (converted) or an `m` suffix,
/// with pt-BR decimal commas accepted.
pub fn parse_distance_meters(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64),
        Value::String(s) => {
            let normalized = s.trim().to_ascii_lowercase();
            if normalized.is_empty() {
                return None;
            }
            let numeric: String = normalized
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ','))
                .collect();
            let parsed = numeric.replace(',', ".").parse::<f64>().ok()?;
            if !parsed.is_finite() {
                return None;
            }
            let meters = if normalized.contains("km") {
                parsed * 1000.0
            } else {
                parsed
            };
            Some(meters.round() as i64)
        }
        _ => None,
    }
}

/// Normalize a walk-time value to whole minutes. Strings may carry
/// non-digit noise ("~10 min"), which is stripped before parsing.
pub fn parse_walk_minutes(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                None
            } else {
                digits.parse::<i64>().ok()
            }
        }
        _ => None,
    }
}

/// Reject unknown amenity ids before any write happens.
pub async fn verify_amenity_ids(pool: &SqlitePool, ids: &[i64]) -> UpdateResult<()> {
    let mut missing = Vec::new();
    for id in ids {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM amenidades WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        if found.is_none() {
            missing.push(*id);
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(UpdateError::NotFound(format!(
            "unknown amenity ids: {:?}",
            missing
        )))
    }
}

/// Replace the amenity set for a property inside the caller's transaction.
pub async fn sync_amenities(
    tx: &mut Transaction<'_, Sqlite>,
    imovel_id: i64,
    ids: &[i64],
) -> UpdateResult<()> {
    sqlx::query("DELETE FROM imovel_amenidades WHERE imovel_fk = ?")
        .bind(imovel_id)
        .execute(&mut **tx)
        .await?;

    for id in ids {
        sqlx::query("INSERT INTO imovel_amenidades (imovel_fk, amenidade_fk) VALUES (?, ?)")
            .bind(imovel_id)
            .bind(id)
            .execute(&mut **tx)
            .await?;
    }

    debug!(imovel_id, count = ids.len(), "Amenity set replaced");
    Ok(())
}

/// Replace the proximity set for a property inside the caller's
/// transaction, including per-relation attributes.
pub async fn sync_proximities(
    tx: &mut Transaction<'_, Sqlite>,
    imovel_id: i64,
    records: &[ProximityLink],
) -> UpdateResult<()> {
    sqlx::query("DELETE FROM imovel_proximidades WHERE imovel_fk = ?")
        .bind(imovel_id)
        .execute(&mut **tx)
        .await?;

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO imovel_proximidades
                (imovel_fk, proximidade_fk, distancia_metros, tempo_caminhada, observacoes)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(imovel_id)
        .bind(record.proximidade_fk)
        .bind(record.distancia_metros)
        .bind(record.tempo_caminhada)
        .bind(&record.observacoes)
        .execute(&mut **tx)
        .await?;
    }

    debug!(imovel_id, count = records.len(), "Proximity set replaced");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amenity_ids_wrapped_and_raw() {
        let ids = parse_amenity_ids(&json!([{ "id": 1 }, { "id": 1 }, 2]));
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn distance_in_meters_and_kilometers() {
        assert_eq!(parse_distance_meters(&json!(350)), Some(350));
        assert_eq!(parse_distance_meters(&json!(350.4)), Some(350));
        assert_eq!(parse_distance_meters(&json!("350 m")), Some(350));
        assert_eq!(parse_distance_meters(&json!("1,5 km")), Some(1500));
        assert_eq!(parse_distance_meters(&json!("2km")), Some(2000));
        assert_eq!(parse_distance_meters(&json!("")), None);
        assert_eq!(parse_distance_meters(&json!("perto")), None);
        assert_eq!(parse_distance_meters(&json!(null)), None);
    }

    #[test]
    fn walk_minutes_with_noise() {
        assert_eq!(parse_walk_minutes(&json!(10)), Some(10));
        assert_eq!(parse_walk_minutes(&json!("~10 min")), Some(10));
        assert_eq!(parse_walk_minutes(&json!("5")), Some(5));
        assert_eq!(parse_walk_minutes(&json!("a pé")), None);
        assert_eq!(parse_walk_minutes(&json!(null)), None);
    }

    #[test]
    fn proximity_records_full_shape() {
        let records = parse_proximity_records(&json!([
            { "id": 7, "distancia": "1,2 km", "tempo_caminhada": "15 min", "observacoes": " perto do metrô " },
            { "proximidade_id": 3, "distancia_metros": 400 },
            { "nome": "sem id" },
            9
        ]));

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].proximidade_fk, 3);
        assert_eq!(records[0].distancia_metros, Some(400));
        assert_eq!(records[1].proximidade_fk, 7);
        assert_eq!(records[1].distancia_metros, Some(1200));
        assert_eq!(records[1].tempo_caminhada, Some(15));
        assert_eq!(records[1].observacoes.as_deref(), Some("perto do metrô"));
        assert_eq!(records[2].proximidade_fk, 9);
        assert_eq!(records[2].distancia_metros, None);
    }

    #[test]
    fn proximity_duplicates_collapse() {
        let records = parse_proximity_records(&json!([
            { "id": 5, "distancia_metros": 100 },
            { "id": 5, "distancia_metros": 900 },
        ]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].distancia_metros, Some(100));
    }
}
