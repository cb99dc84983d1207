//! Update orchestrator
//!
//! Entry point of the reconciliation engine. Classifies an incoming
//! change-set, runs the fast path for single-flag updates or the full
//! reconciliation otherwise, and keeps the failure-isolation discipline:
//! everything up to and including the core transaction is critical and
//! propagates; everything after it (audit record, history append) is
//! advisory and only ever logged.

use crate::audit::{build_changes, ChangeEntry, ChangeMap};
use crate::error::{UpdateError, UpdateResult};
use crate::geocoding::{needs_refresh, AddressInput, GeocodingResolver};
use crate::history;
use crate::normalize::{normalize_boolean, normalize_number, normalize_string};
use crate::outcome::{AdvisoryFailure, StepOutcome};
use crate::payload::UpdatePayload;
use crate::relations::{
    parse_amenity_ids, parse_proximity_records, sync_amenities, sync_proximities,
    verify_amenity_ids,
};
use crate::snapshot::{load_snapshot, PropertySnapshot};
use imob_common::db::ProximityLink;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Shape of an incoming change-set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Payload is exactly `{status_fk}`
    StatusOnly,
    /// Payload keys are a non-empty subset of the featured flags
    FeaturedOnly,
    /// Anything else: full reconciliation
    Full,
}

/// Classify a payload by its top-level keys.
pub fn classify(payload: &UpdatePayload) -> RequestClass {
    let keys: Vec<&str> = payload.keys().collect();
    if keys.len() == 1 && keys[0] == "status_fk" {
        return RequestClass::StatusOnly;
    }
    if !keys.is_empty()
        && keys
            .iter()
            .all(|k| matches!(*k, "destaque" | "destaque_nacional"))
    {
        return RequestClass::FeaturedOnly;
    }
    RequestClass::Full
}

/// Outcome of a successful reconciliation. Advisory failures are reported
/// here, never as an `Err`.
#[derive(Debug)]
pub struct ReconcileReport {
    pub message: String,
    pub class: RequestClass,
    /// Entries in the audit change-map (0 for a no-op edit)
    pub changed_fields: usize,
    /// Status transition applied by this request, if any
    pub status_transition: Option<StatusTransition>,
    pub advisories: Vec<AdvisoryFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusTransition {
    pub from: Option<i64>,
    pub to: i64,
}

/// The reconciliation engine. Stateless between calls; the pool is the
/// only shared resource.
pub struct UpdateOrchestrator {
    pool: SqlitePool,
    resolver: GeocodingResolver,
}

impl UpdateOrchestrator {
    pub fn new(pool: SqlitePool, resolver: GeocodingResolver) -> Self {
        Self { pool, resolver }
    }

    /// Reconcile an update payload against the stored property.
    pub async fn reconcile_update(
        &self,
        imovel_id: i64,
        actor: &str,
        raw_payload: Value,
    ) -> UpdateResult<ReconcileReport> {
        let payload = UpdatePayload::from_value(raw_payload)?;
        if payload.is_empty() {
            return Err(UpdateError::InvalidPayload("empty update payload".into()));
        }

        let snapshot = load_snapshot(&self.pool, imovel_id).await?;
        let class = classify(&payload);
        debug!(imovel_id, ?class, keys = payload.len(), "Update classified");

        match class {
            RequestClass::StatusOnly => self.apply_status_update(&snapshot, &payload, actor).await,
            RequestClass::FeaturedOnly => {
                self.apply_featured_update(&snapshot, &payload, actor).await
            }
            RequestClass::Full => self.apply_full_update(snapshot, payload, actor).await,
        }
    }

    /// Snapshot read, exposed for the HTTP layer's GET path.
    pub async fn load_snapshot(&self, imovel_id: i64) -> UpdateResult<PropertySnapshot> {
        load_snapshot(&self.pool, imovel_id).await
    }

    // ------------------------------------------------------------------
    // Fast paths
    // ------------------------------------------------------------------

    async fn apply_status_update(
        &self,
        snapshot: &PropertySnapshot,
        payload: &UpdatePayload,
        actor: &str,
    ) -> UpdateResult<ReconcileReport> {
        let new_status = payload
            .field("status_fk")
            .and_then(normalize_number)
            .map(|f| f.round() as i64)
            .ok_or(UpdateError::Validation {
                field: "status_fk",
                message: "a numeric status id is required".into(),
            })?;

        let old_status = snapshot.row.status_fk;

        // Critical single-field write
        sqlx::query(
            "UPDATE imoveis SET status_fk = ?, updated_by = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(new_status)
        .bind(actor)
        .bind(snapshot.row.id)
        .execute(&self.pool)
        .await?;

        let changed = old_status != Some(new_status);
        let mut advisories = Vec::new();

        if changed {
            let history_outcome = StepOutcome::from_result(
                "history append",
                history::append_if_changed(
                    &self.pool,
                    snapshot.row.id,
                    old_status,
                    Some(new_status),
                    actor,
                )
                .await,
            );
            advisories.extend(history_outcome.failure());

            let mut changes = ChangeMap::new();
            changes.insert(
                "status_fk".to_string(),
                ChangeEntry::scalar(
                    old_status.map(Value::from).unwrap_or(Value::Null),
                    Value::from(new_status),
                ),
            );
            let audit_outcome = StepOutcome::from_result(
                "audit record",
                self.record_audit(snapshot, actor, "mudanca-status", &changes)
                    .await,
            );
            advisories.extend(audit_outcome.failure());
        }

        info!(
            imovel_id = snapshot.row.id,
            from = ?old_status,
            to = new_status,
            changed,
            "Status fast path applied"
        );

        Ok(ReconcileReport {
            message: "Status updated".to_string(),
            class: RequestClass::StatusOnly,
            changed_fields: usize::from(changed),
            status_transition: changed.then_some(StatusTransition {
                from: old_status,
                to: new_status,
            }),
            advisories,
        })
    }

    async fn apply_featured_update(
        &self,
        snapshot: &PropertySnapshot,
        payload: &UpdatePayload,
        actor: &str,
    ) -> UpdateResult<ReconcileReport> {
        let mut changes = ChangeMap::new();
        let mut new_destaque = snapshot.row.destaque;
        let mut new_destaque_nacional = snapshot.row.destaque_nacional;

        for (field, stored, slot) in [
            ("destaque", snapshot.row.destaque, &mut new_destaque),
            (
                "destaque_nacional",
                snapshot.row.destaque_nacional,
                &mut new_destaque_nacional,
            ),
        ] {
            let Some(raw) = payload.field(field) else {
                continue;
            };
            let value = normalize_boolean(raw).ok_or(UpdateError::Validation {
                field,
                message: "a boolean value is required".into(),
            })?;
            *slot = Some(value);
            if stored != Some(value) {
                changes.insert(
                    field.to_string(),
                    ChangeEntry::scalar(
                        stored.map(Value::Bool).unwrap_or(Value::Null),
                        Value::Bool(value),
                    ),
                );
            }
        }

        // Critical flag write
        sqlx::query(
            r#"
            UPDATE imoveis
            SET destaque = ?, destaque_nacional = ?, updated_by = ?, updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(new_destaque)
        .bind(new_destaque_nacional)
        .bind(actor)
        .bind(snapshot.row.id)
        .execute(&self.pool)
        .await?;

        let mut advisories = Vec::new();
        if !changes.is_empty() {
            let audit_outcome = StepOutcome::from_result(
                "audit record",
                self.record_audit(snapshot, actor, "destacar-imovel", &changes)
                    .await,
            );
            advisories.extend(audit_outcome.failure());
        }

        info!(
            imovel_id = snapshot.row.id,
            changed = changes.len(),
            "Featured fast path applied"
        );

        Ok(ReconcileReport {
            message: "Featured flags updated".to_string(),
            class: RequestClass::FeaturedOnly,
            changed_fields: changes.len(),
            status_transition: None,
            advisories,
        })
    }

    // ------------------------------------------------------------------
    // Full path
    // ------------------------------------------------------------------

    async fn apply_full_update(
        &self,
        snapshot: PropertySnapshot,
        mut payload: UpdatePayload,
        actor: &str,
    ) -> UpdateResult<ReconcileReport> {
        let row = &snapshot.row;

        // Proprietor reference: explicit null clears, anything else must be
        // a UUID of an existing proprietor. Rejected before any write.
        let new_proprietario = match payload.field("proprietario_uuid") {
            None => row.proprietario_uuid.clone(),
            Some(raw) => match normalize_string(raw) {
                None => None,
                Some(candidate) => {
                    if uuid::Uuid::parse_str(&candidate).is_err() {
                        return Err(UpdateError::Validation {
                            field: "proprietario_uuid",
                            message: "proprietor reference must be a UUID".into(),
                        });
                    }
                    let exists: Option<String> =
                        sqlx::query_scalar("SELECT uuid FROM proprietarios WHERE uuid = ?")
                            .bind(&candidate)
                            .fetch_optional(&self.pool)
                            .await?;
                    Some(exists.ok_or_else(|| {
                        UpdateError::NotFound(format!("proprietor {}", candidate))
                    })?)
                }
            },
        };

        // A structured-address payload must carry a street number; this is
        // rejected before the geocoding resolver is ever consulted.
        if payload.has_address_block()
            && payload
                .address_field("numero")
                .and_then(normalize_string)
                .is_none()
        {
            return Err(UpdateError::Validation {
                field: "numero",
                message: "the street number is required".into(),
            });
        }

        // Relation inputs parse up front; unknown amenity ids reject the
        // whole request before the core write.
        let amenity_ids: Option<Vec<i64>> = payload.raw("amenidades").map(parse_amenity_ids);
        if let Some(ids) = &amenity_ids {
            verify_amenity_ids(&self.pool, ids).await?;
        }
        let proximity_records: Option<Vec<ProximityLink>> =
            payload.raw("proximidades").map(parse_proximity_records);

        // Effective address after the merge, used for the geocoding policy
        let new_endereco = self.merged_string(&payload, "endereco", &row.endereco);
        let new_numero = self.merged_string(&payload, "numero", &row.numero);
        let new_complemento = self.merged_string(&payload, "complemento", &row.complemento);
        let new_bairro = self.merged_string(&payload, "bairro", &row.bairro);
        let new_cidade = self.merged_string(&payload, "cidade", &row.cidade);
        let new_estado = self.merged_string(&payload, "estado", &row.estado);
        let new_cep = self.merged_string(&payload, "cep", &row.cep);

        let refresh = needs_refresh(
            row.cep.as_deref(),
            row.numero.as_deref(),
            snapshot.has_coordinates(),
            new_cep.as_deref(),
            new_numero.as_deref(),
        );

        let mut resolved = None;
        if refresh && new_cep.is_some() && new_numero.is_some() {
            let input = AddressInput {
                endereco: new_endereco.clone(),
                numero: new_numero.clone(),
                complemento: new_complemento.clone(),
                bairro: new_bairro.clone(),
                cidade: new_cidade.clone(),
                estado: new_estado.clone(),
                cep: new_cep.clone(),
            };
            resolved = self.resolver.resolve(&input).await;
            match resolved {
                Some(coords) => info!(
                    imovel_id = row.id,
                    lat = coords.lat,
                    lon = coords.lon,
                    "Coordinates recomputed"
                ),
                None => info!(
                    imovel_id = row.id,
                    "Geocoding failed, keeping stored coordinates"
                ),
            }
        } else {
            debug!(imovel_id = row.id, "Coordinates unchanged, geocoding skipped");
        }

        // Stale-but-present beats absent: a failed resolution keeps the
        // stored coordinates.
        let (final_lat, final_lon) = match resolved {
            Some(coords) => (Some(coords.lat), Some(coords.lon)),
            None => (row.latitude, row.longitude),
        };

        // The diff must reflect what is actually written, so the effective
        // coordinates replace whatever the payload carried.
        payload.set(
            "latitude",
            final_lat.map(|v| json!(v)).unwrap_or(Value::Null),
        );
        payload.set(
            "longitude",
            final_lon.map(|v| json!(v)).unwrap_or(Value::Null),
        );

        let new_status = self.merged_i64(&payload, "status_fk", row.status_fk);

        // Core write and relation syncs are one atomic unit: a reader never
        // observes the fields updated without the relations or vice versa.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE imoveis SET
                titulo = ?, descricao = ?,
                endereco = ?, numero = ?, complemento = ?, bairro = ?,
                cidade = ?, estado = ?, cep = ?,
                latitude = ?, longitude = ?,
                preco = ?, preco_condominio = ?, preco_iptu = ?, taxa_extra = ?,
                area_total = ?, area_construida = ?,
                quartos = ?, banheiros = ?, suites = ?, varanda = ?,
                vagas_garagem = ?, andar = ?, total_andares = ?,
                mobiliado = ?, aceita_permuta = ?, aceita_financiamento = ?,
                destaque = ?, destaque_nacional = ?,
                tipo_fk = ?, finalidade_fk = ?, status_fk = ?,
                proprietario_uuid = ?,
                updated_by = ?, updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(self.merged_string(&payload, "titulo", &row.titulo))
        .bind(self.merged_string(&payload, "descricao", &row.descricao))
        .bind(&new_endereco)
        .bind(&new_numero)
        .bind(&new_complemento)
        .bind(&new_bairro)
        .bind(&new_cidade)
        .bind(&new_estado)
        .bind(&new_cep)
        .bind(final_lat)
        .bind(final_lon)
        .bind(self.merged_f64(&payload, "preco", row.preco))
        .bind(self.merged_f64(&payload, "preco_condominio", row.preco_condominio))
        .bind(self.merged_f64(&payload, "preco_iptu", row.preco_iptu))
        .bind(self.merged_f64(&payload, "taxa_extra", row.taxa_extra))
        .bind(self.merged_f64(&payload, "area_total", row.area_total))
        .bind(self.merged_f64(&payload, "area_construida", row.area_construida))
        .bind(self.merged_i64(&payload, "quartos", row.quartos))
        .bind(self.merged_i64(&payload, "banheiros", row.banheiros))
        .bind(self.merged_i64(&payload, "suites", row.suites))
        .bind(self.merged_i64(&payload, "varanda", row.varanda))
        .bind(self.merged_i64(&payload, "vagas_garagem", row.vagas_garagem))
        .bind(self.merged_i64(&payload, "andar", row.andar))
        .bind(self.merged_i64(&payload, "total_andares", row.total_andares))
        .bind(self.merged_bool(&payload, "mobiliado", row.mobiliado))
        .bind(self.merged_bool(&payload, "aceita_permuta", row.aceita_permuta))
        .bind(self.merged_bool(&payload, "aceita_financiamento", row.aceita_financiamento))
        .bind(self.merged_bool(&payload, "destaque", row.destaque))
        .bind(self.merged_bool(&payload, "destaque_nacional", row.destaque_nacional))
        .bind(self.merged_i64(&payload, "tipo_fk", row.tipo_fk))
        .bind(self.merged_i64(&payload, "finalidade_fk", row.finalidade_fk))
        .bind(new_status)
        .bind(&new_proprietario)
        .bind(actor)
        .bind(row.id)
        .execute(&mut *tx)
        .await?;

        if let Some(ids) = &amenity_ids {
            sync_amenities(&mut tx, row.id, ids).await?;
        }
        if let Some(records) = &proximity_records {
            sync_proximities(&mut tx, row.id, records).await?;
        }

        tx.commit().await?;

        // Everything below is advisory: logged, reported, never escalated.
        let changes = build_changes(&snapshot, &payload);
        let mut advisories = Vec::new();

        let audit_outcome = if changes.is_empty() {
            debug!(imovel_id = row.id, "No effective changes, audit record skipped");
            StepOutcome::Skipped
        } else {
            StepOutcome::from_result(
                "audit record",
                self.record_audit(&snapshot, actor, "imoveis", &changes).await,
            )
        };
        advisories.extend(audit_outcome.failure());

        let history_outcome = StepOutcome::from_result(
            "history append",
            history::append_if_changed(&self.pool, row.id, row.status_fk, new_status, actor)
                .await,
        );
        advisories.extend(history_outcome.failure());

        let status_transition = match new_status {
            Some(to) if row.status_fk != Some(to) => Some(StatusTransition {
                from: row.status_fk,
                to,
            }),
            _ => None,
        };

        info!(
            imovel_id = row.id,
            changed = changes.len(),
            advisories = advisories.len(),
            "Full reconciliation applied"
        );

        Ok(ReconcileReport {
            message: "Property updated".to_string(),
            class: RequestClass::Full,
            changed_fields: changes.len(),
            status_transition,
            advisories,
        })
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Merge rule: absent payload field keeps the stored value; a present
    /// field (including explicit null) replaces it with its normalized
    /// form.
    fn merged_string(
        &self,
        payload: &UpdatePayload,
        name: &str,
        stored: &Option<String>,
    ) -> Option<String> {
        match payload.field(name) {
            Some(raw) => normalize_string(raw),
            None => stored.clone(),
        }
    }

    fn merged_f64(&self, payload: &UpdatePayload, name: &str, stored: Option<f64>) -> Option<f64> {
        match payload.field(name) {
            Some(raw) => normalize_number(raw),
            None => stored,
        }
    }

    fn merged_i64(&self, payload: &UpdatePayload, name: &str, stored: Option<i64>) -> Option<i64> {
        match payload.field(name) {
            Some(raw) => normalize_number(raw).map(|f| f.round() as i64),
            None => stored,
        }
    }

    fn merged_bool(
        &self,
        payload: &UpdatePayload,
        name: &str,
        stored: Option<bool>,
    ) -> Option<bool> {
        match payload.field(name) {
            Some(raw) => normalize_boolean(raw),
            None => stored,
        }
    }

    /// Persist the audit record. Advisory: the caller demotes any error.
    async fn record_audit(
        &self,
        snapshot: &PropertySnapshot,
        actor: &str,
        resource: &str,
        changes: &ChangeMap,
    ) -> UpdateResult<bool> {
        // Actor display name is best-effort; the id is what matters
        let actor_name: Option<String> =
            sqlx::query_scalar("SELECT COALESCE(nome, username) FROM users WHERE uuid = ?")
                .bind(actor)
                .fetch_optional(&self.pool)
                .await
                .ok()
                .flatten();

        let codigo = snapshot.row.codigo.as_deref().unwrap_or("?");
        let details = json!({
            "description": format!("Updated property {}", codigo),
            "imovel_codigo": snapshot.row.codigo,
            "imovel_titulo": snapshot.row.titulo,
            "changes": changes,
            "total_changes": changes.len(),
            "updated_by": actor,
            "updated_by_name": actor_name,
            "updated_at": chrono::Utc::now().to_rfc3339(),
        });

        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, resource, resource_id, details, created_at)
            VALUES (?, 'UPDATE', ?, ?, ?, datetime('now'))
            "#,
        )
        .bind(actor)
        .bind(resource)
        .bind(snapshot.row.id)
        .bind(details.to_string())
        .execute(&self.pool)
        .await?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> UpdatePayload {
        UpdatePayload::from_value(value).unwrap()
    }

    #[test]
    fn status_only_classification() {
        assert_eq!(
            classify(&payload(json!({ "status_fk": 5 }))),
            RequestClass::StatusOnly
        );
    }

    #[test]
    fn featured_classification() {
        assert_eq!(
            classify(&payload(json!({ "destaque": true }))),
            RequestClass::FeaturedOnly
        );
        assert_eq!(
            classify(&payload(json!({ "destaque_nacional": false }))),
            RequestClass::FeaturedOnly
        );
        assert_eq!(
            classify(&payload(json!({ "destaque": true, "destaque_nacional": false }))),
            RequestClass::FeaturedOnly
        );
    }

    #[test]
    fn anything_else_is_full() {
        assert_eq!(
            classify(&payload(json!({ "status_fk": 5, "titulo": "x" }))),
            RequestClass::Full
        );
        assert_eq!(
            classify(&payload(json!({ "destaque": true, "preco": 1 }))),
            RequestClass::Full
        );
        assert_eq!(
            classify(&payload(json!({ "titulo": "x" }))),
            RequestClass::Full
        );
    }
}
