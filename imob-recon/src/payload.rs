//! Update payload field resolution
//!
//! The frontend sends update payloads with inconsistent field spelling
//! (camelCase or snake_case for the same concept) and with address fields
//! either flat or nested inside an `endereco` object. This module resolves
//! both through one declarative alias table instead of per-call-site
//! branching.
//!
//! Lookup semantics distinguish two cases the rest of the engine relies on:
//! a field **absent** from the payload (`None` — leave the stored value
//! unchanged) versus **present with a JSON null** (`Some(Null)` — clear the
//! stored value).

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Alias spellings per canonical field name, camelCase tried first.
static FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("preco_condominio", &["precoCondominio", "preco_condominio"]),
    ("preco_iptu", &["precoIPTU", "preco_iptu"]),
    ("taxa_extra", &["taxaExtra", "taxa_extra"]),
    ("area_total", &["areaTotal", "area_total"]),
    ("area_construida", &["areaConstruida", "area_construida"]),
    ("vagas_garagem", &["vagasGaragem", "vagas_garagem"]),
    ("total_andares", &["totalAndares", "total_andares"]),
    ("aceita_permuta", &["aceitaPermuta", "aceita_permuta"]),
    ("aceita_financiamento", &["aceitaFinanciamento", "aceita_financiamento"]),
    ("proprietario_uuid", &["proprietario_uuid", "proprietario_fk"]),
];

static ALIAS_INDEX: Lazy<HashMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| FIELD_ALIASES.iter().copied().collect());

/// Address fields that may arrive nested inside the `endereco` object.
/// `endereco` itself doubles as the street-name field.
pub const ADDRESS_FIELDS: &[&str] = &[
    "endereco",
    "numero",
    "complemento",
    "bairro",
    "cidade",
    "estado",
    "cep",
];

/// A raw update request: the JSON object the HTTP layer passed through.
#[derive(Debug, Clone)]
pub struct UpdatePayload {
    map: Map<String, Value>,
}

impl UpdatePayload {
    /// Wrap a JSON value; anything but an object is rejected.
    pub fn from_value(value: Value) -> Result<Self, crate::UpdateError> {
        match value {
            Value::Object(map) => Ok(Self { map }),
            other => Err(crate::UpdateError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Top-level keys, for request classification.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Raw top-level lookup, no alias resolution.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Resolve a canonical field name through the alias table. Address
    /// fields route through the nested-or-flat address resolution.
    ///
    /// `None` = absent (leave unchanged); `Some(Value::Null)` = explicit
    /// clear.
    pub fn field(&self, canonical: &str) -> Option<&Value> {
        if ADDRESS_FIELDS.contains(&canonical) {
            return self.address_field(canonical);
        }
        let aliases: &[&str] = match ALIAS_INDEX.get(canonical) {
            Some(list) => list,
            None => std::slice::from_ref(&canonical),
        };
        aliases.iter().find_map(|alias| self.map.get(*alias))
    }

    /// True when the payload carries a structured `endereco` sub-object.
    pub fn has_address_block(&self) -> bool {
        matches!(self.map.get("endereco"), Some(Value::Object(_)))
    }

    /// Resolve one address field from the nested `endereco` object when
    /// present, or from the flat top-level key otherwise. Both shapes
    /// produce identical results downstream.
    pub fn address_field(&self, name: &str) -> Option<&Value> {
        match self.map.get("endereco") {
            Some(Value::Object(addr)) => addr.get(name),
            // Flat shape: `endereco` is the street string itself
            other if name == "endereco" => other.filter(|v| !v.is_object()),
            _ => self.map.get(name),
        }
    }

    /// Insert or replace a top-level field. Used by the orchestrator to
    /// inject resolved coordinates into the effective payload before
    /// diffing.
    pub fn set(&mut self, key: &str, value: Value) {
        self.map.insert(key.to_string(), value);
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
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
    fn rejects_non_object() {
        assert!(UpdatePayload::from_value(json!([1, 2])).is_err());
        assert!(UpdatePayload::from_value(json!("x")).is_err());
    }

    #[test]
    fn camel_case_alias_wins() {
        let p = payload(json!({ "precoCondominio": "850,00", "preco_condominio": "999,00" }));
        assert_eq!(p.field("preco_condominio"), Some(&json!("850,00")));
    }

    #[test]
    fn snake_case_fallback() {
        let p = payload(json!({ "preco_iptu": 120.0 }));
        assert_eq!(p.field("preco_iptu"), Some(&json!(120.0)));
    }

    #[test]
    fn absent_field_is_none_null_is_present() {
        let p = payload(json!({ "titulo": null }));
        assert_eq!(p.field("titulo"), Some(&Value::Null));
        assert_eq!(p.field("descricao"), None);
    }

    #[test]
    fn nested_and_flat_address_agree() {
        let nested = payload(json!({
            "endereco": { "endereco": "Rua das Flores", "cep": "50000-000", "numero": "12" }
        }));
        let flat = payload(json!({
            "endereco": "Rua das Flores", "cep": "50000-000", "numero": "12"
        }));
        for field in ["endereco", "cep", "numero"] {
            assert_eq!(nested.address_field(field), flat.address_field(field), "{field}");
        }
        assert!(nested.has_address_block());
        assert!(!flat.has_address_block());
    }

    #[test]
    fn nested_address_missing_key_is_absent() {
        let p = payload(json!({ "endereco": { "cep": "50000-000", "numero": "12" } }));
        assert_eq!(p.address_field("bairro"), None);
    }

    #[test]
    fn legacy_proprietario_fk_alias() {
        let p = payload(json!({ "proprietario_fk": "not-a-uuid" }));
        assert_eq!(p.field("proprietario_uuid"), Some(&json!("not-a-uuid")));
    }
}
