//! Audit diff builder
//!
//! Pure comparison of a stored snapshot against an incoming update payload.
//! No I/O, no mutation: given the same inputs the output is identical,
//! which is what makes the audit trail testable without a database. Only
//! fields whose normalized values actually differ produce entries; a
//! payload field that is absent is skipped entirely (the caller sends only
//! fields intended for update), while an explicit JSON null records a
//! change to null.

use crate::normalize::{normalize_boolean, normalize_number, normalize_string, normalize_id_set};
use crate::payload::UpdatePayload;
use crate::snapshot::PropertySnapshot;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Field name → before/after detail. BTreeMap keeps serialization
/// deterministic.
pub type ChangeMap = BTreeMap<String, ChangeEntry>;

/// Direction tag for count-only fields
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CountAction {
    Added,
    Removed,
}

/// One changed field. Relation fields carry `added`/`removed` id lists
/// (only when non-empty); count fields carry an `action` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEntry {
    pub before: Value,
    pub after: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<CountAction>,
}

impl ChangeEntry {
    pub fn scalar(before: Value, after: Value) -> Self {
        Self {
            before,
            after,
            added: None,
            removed: None,
            action: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Text,
    Number,
    Flag,
}

/// Every scalar field the audit trail tracks. Relation and count fields
/// are handled separately below.
static TRACKED_FIELDS: &[(&str, FieldKind)] = &[
    ("titulo", FieldKind::Text),
    ("descricao", FieldKind::Text),
    ("endereco", FieldKind::Text),
    ("numero", FieldKind::Text),
    ("complemento", FieldKind::Text),
    ("bairro", FieldKind::Text),
    ("cidade", FieldKind::Text),
    ("estado", FieldKind::Text),
    ("cep", FieldKind::Text),
    ("latitude", FieldKind::Number),
    ("longitude", FieldKind::Number),
    ("preco", FieldKind::Number),
    ("preco_condominio", FieldKind::Number),
    ("preco_iptu", FieldKind::Number),
    ("taxa_extra", FieldKind::Number),
    ("area_total", FieldKind::Number),
    ("area_construida", FieldKind::Number),
    ("quartos", FieldKind::Number),
    ("banheiros", FieldKind::Number),
    ("suites", FieldKind::Number),
    ("varanda", FieldKind::Number),
    ("vagas_garagem", FieldKind::Number),
    ("andar", FieldKind::Number),
    ("total_andares", FieldKind::Number),
    ("mobiliado", FieldKind::Flag),
    ("aceita_permuta", FieldKind::Flag),
    ("aceita_financiamento", FieldKind::Flag),
    ("destaque", FieldKind::Flag),
    ("destaque_nacional", FieldKind::Flag),
    ("tipo_fk", FieldKind::Number),
    ("finalidade_fk", FieldKind::Number),
    ("status_fk", FieldKind::Number),
    ("proprietario_uuid", FieldKind::Text),
];

/// Build the change-map between a stored snapshot and an update payload.
///
/// The payload passed here is the *effective* payload: when the caller
/// resolved fresh coordinates it injects them first, so a failed geocoding
/// never shows up as a coordinate change.
pub fn build_changes(before: &PropertySnapshot, payload: &UpdatePayload) -> ChangeMap {
    let mut changes = ChangeMap::new();

    for &(name, kind) in TRACKED_FIELDS {
        let Some(raw_after) = payload.field(name) else {
            continue;
        };
        let before_value = snapshot_value(before, name);
        if let Some(entry) = compare_scalar(kind, &before_value, raw_after) {
            changes.insert(name.to_string(), entry);
        }
    }

    if let Some(raw) = payload.raw("amenidades") {
        if let Some(entry) = compare_id_set(&before.amenidades, raw) {
            changes.insert("amenidades".to_string(), entry);
        }
    }

    if let Some(raw) = payload.raw("proximidades") {
        if let Some(entry) = compare_id_set(&before.proximidade_ids(), raw) {
            changes.insert("proximidades".to_string(), entry);
        }
    }

    if let Some(Value::Array(imagens)) = payload.raw("imagens") {
        if let Some(entry) = compare_count(before.imagens_count, imagens.len() as i64) {
            changes.insert("imagens_count".to_string(), entry);
        }
    }

    if let Some(Value::Array(documentos)) = payload.raw("documentos") {
        if let Some(entry) = compare_count(before.documentos_count, documentos.len() as i64) {
            changes.insert("documentos_count".to_string(), entry);
        }
    }

    changes
}

fn compare_scalar(kind: FieldKind, before: &Value, after: &Value) -> Option<ChangeEntry> {
    match kind {
        FieldKind::Text => {
            let b = normalize_string(before);
            let a = normalize_string(after);
            (b != a).then(|| ChangeEntry::scalar(opt_string(b), opt_string(a)))
        }
        FieldKind::Number => {
            let b = normalize_number(before);
            let a = normalize_number(after);
            (b != a).then(|| ChangeEntry::scalar(opt_number(b), opt_number(a)))
        }
        FieldKind::Flag => {
            let b = normalize_boolean(before);
            let a = normalize_boolean(after);
            (b != a).then(|| {
                ChangeEntry::scalar(
                    b.map(Value::Bool).unwrap_or(Value::Null),
                    a.map(Value::Bool).unwrap_or(Value::Null),
                )
            })
        }
    }
}

fn compare_id_set(before_ids: &[i64], raw_after: &Value) -> Option<ChangeEntry> {
    let after_ids = normalize_id_set(raw_after);
    if before_ids == after_ids.as_slice() {
        return None;
    }

    let added: Vec<i64> = after_ids
        .iter()
        .filter(|id| !before_ids.contains(id))
        .copied()
        .collect();
    let removed: Vec<i64> = before_ids
        .iter()
        .filter(|id| !after_ids.contains(id))
        .copied()
        .collect();

    Some(ChangeEntry {
        before: id_values(before_ids),
        after: id_values(&after_ids),
        added: (!added.is_empty()).then_some(added),
        removed: (!removed.is_empty()).then_some(removed),
        action: None,
    })
}

fn compare_count(before: i64, after: i64) -> Option<ChangeEntry> {
    if before == after {
        return None;
    }
    Some(ChangeEntry {
        before: Value::from(before),
        after: Value::from(after),
        added: None,
        removed: None,
        action: Some(if after > before {
            CountAction::Added
        } else {
            CountAction::Removed
        }),
    })
}

/// The stored "before" value of one tracked field as a JSON value.
fn snapshot_value(snapshot: &PropertySnapshot, name: &str) -> Value {
    let row = &snapshot.row;
    match name {
        "titulo" => opt_str(&row.titulo),
        "descricao" => opt_str(&row.descricao),
        "endereco" => opt_str(&row.endereco),
        "numero" => opt_str(&row.numero),
        "complemento" => opt_str(&row.complemento),
        "bairro" => opt_str(&row.bairro),
        "cidade" => opt_str(&row.cidade),
        "estado" => opt_str(&row.estado),
        "cep" => opt_str(&row.cep),
        "latitude" => opt_f64(row.latitude),
        "longitude" => opt_f64(row.longitude),
        "preco" => opt_f64(row.preco),
        "preco_condominio" => opt_f64(row.preco_condominio),
        "preco_iptu" => opt_f64(row.preco_iptu),
        "taxa_extra" => opt_f64(row.taxa_extra),
        "area_total" => opt_f64(row.area_total),
        "area_construida" => opt_f64(row.area_construida),
        "quartos" => opt_i64(row.quartos),
        "banheiros" => opt_i64(row.banheiros),
        "suites" => opt_i64(row.suites),
        "varanda" => opt_i64(row.varanda),
        "vagas_garagem" => opt_i64(row.vagas_garagem),
        "andar" => opt_i64(row.andar),
        "total_andares" => opt_i64(row.total_andares),
        "mobiliado" => opt_bool(row.mobiliado),
        "aceita_permuta" => opt_bool(row.aceita_permuta),
        "aceita_financiamento" => opt_bool(row.aceita_financiamento),
        "destaque" => opt_bool(row.destaque),
        "destaque_nacional" => opt_bool(row.destaque_nacional),
        "tipo_fk" => opt_i64(row.tipo_fk),
        "finalidade_fk" => opt_i64(row.finalidade_fk),
        "status_fk" => opt_i64(row.status_fk),
        "proprietario_uuid" => opt_str(&row.proprietario_uuid),
        _ => Value::Null,
    }
}

fn opt_str(value: &Option<String>) -> Value {
    value.as_deref().map(Value::from).unwrap_or(Value::Null)
}

fn opt_f64(value: Option<f64>) -> Value {
    value.map(number_value).unwrap_or(Value::Null)
}

fn opt_i64(value: Option<i64>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn opt_bool(value: Option<bool>) -> Value {
    value.map(Value::Bool).unwrap_or(Value::Null)
}

fn opt_string(value: Option<String>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn opt_number(value: Option<f64>) -> Value {
    value.map(number_value).unwrap_or(Value::Null)
}

/// Integral values serialize as integers (`5`, not `5.0`) so id and count
/// fields read naturally in the audit trail.
fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Id sets serialize as integer arrays.
fn id_values(ids: &[i64]) -> Value {
    Value::Array(ids.iter().map(|id| Value::from(*id)).collect())
}
