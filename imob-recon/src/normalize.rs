//! Field normalizers
//!
//! Converts the heterogeneous value representations the frontend sends
//! (locale-formatted numeric strings, flag strings, wrapper objects) into
//! canonical comparable values. Every function is total: bad input yields
//! `None` or an empty set, never a panic or NaN. No I/O; the audit diff
//! builder and the orchestrator both normalize through here so that both
//! sides of every comparison agree.

use serde_json::Value;

/// Normalize a numeric value.
///
/// Numbers pass through unchanged. Strings accept the pt-BR locale format
/// (`.` thousands separator, `,` decimal separator — `"1.234,56"` →
/// `1234.56`) as well as plain decimal-point strings (`"10.5"` → `10.5`).
/// A `.` is stripped as a thousands separator only when a `,` decimal is
/// present; currency symbols and other noise are ignored.
pub fn normalize_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_localized_number(s),
        _ => None,
    }
}

fn parse_localized_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Keep digits, separators and sign; drop currency symbols and units
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| !c.is_ascii_digit()) {
        return None;
    }

    let canonical = if cleaned.contains(',') {
        // pt-BR shape: dots are thousands separators, comma is the decimal
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };

    canonical.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Normalize a boolean value.
///
/// Native booleans pass through; `"true"`/`"1"` and `"false"`/`"0"` strings
/// (case-insensitive) and the numbers `1`/`0` are accepted. Anything else is
/// `None`.
pub fn normalize_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Normalize a string value: trim whitespace, map empty-after-trim to `None`
/// so `""` and absence compare equal. Numbers are stringified.
pub fn normalize_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalize an id-set value: an array of raw integers, numeric strings, or
/// wrapper objects carrying one of the recognized id keys. Malformed entries
/// are dropped; the result is deduplicated and sorted so input order never
/// matters.
pub fn normalize_id_set(value: &Value) -> Vec<i64> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    let mut ids: Vec<i64> = items.iter().filter_map(extract_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Pull an integer id out of a raw scalar or a wrapper object.
pub fn extract_id(item: &Value) -> Option<i64> {
    match item {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Object(obj) => ["id", "amenidade_id", "amenidadeId", "proximidade_id"]
            .iter()
            .find_map(|key| obj.get(*key))
            .and_then(extract_id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_passthrough() {
        assert_eq!(normalize_number(&json!(1250.5)), Some(1250.5));
        assert_eq!(normalize_number(&json!(0)), Some(0.0));
        assert_eq!(normalize_number(&json!(-3)), Some(-3.0));
    }

    #[test]
    fn number_localized_string() {
        assert_eq!(normalize_number(&json!("1.234,56")), Some(1234.56));
        assert_eq!(normalize_number(&json!("1.256,00")), Some(1256.0));
        assert_eq!(normalize_number(&json!("R$ 2.500,00")), Some(2500.0));
        assert_eq!(normalize_number(&json!("150")), Some(150.0));
    }

    #[test]
    fn number_decimal_point_string() {
        // No comma present: the dot is a decimal point, not a separator
        assert_eq!(normalize_number(&json!("10.5")), Some(10.5));
        assert_eq!(normalize_number(&json!(" 72.25 ")), Some(72.25));
    }

    #[test]
    fn number_bad_input_is_none_never_nan() {
        assert_eq!(normalize_number(&json!("")), None);
        assert_eq!(normalize_number(&json!("   ")), None);
        assert_eq!(normalize_number(&json!("abc")), None);
        assert_eq!(normalize_number(&json!("R$")), None);
        assert_eq!(normalize_number(&json!(null)), None);
        assert_eq!(normalize_number(&json!(true)), None);
        assert_eq!(normalize_number(&json!([1])), None);
    }

    #[test]
    fn boolean_variants() {
        assert_eq!(normalize_boolean(&json!(true)), Some(true));
        assert_eq!(normalize_boolean(&json!(false)), Some(false));
        assert_eq!(normalize_boolean(&json!("true")), Some(true));
        assert_eq!(normalize_boolean(&json!("TRUE")), Some(true));
        assert_eq!(normalize_boolean(&json!("1")), Some(true));
        assert_eq!(normalize_boolean(&json!("false")), Some(false));
        assert_eq!(normalize_boolean(&json!("0")), Some(false));
        assert_eq!(normalize_boolean(&json!(1)), Some(true));
        assert_eq!(normalize_boolean(&json!(0)), Some(false));
        assert_eq!(normalize_boolean(&json!("yes")), None);
        assert_eq!(normalize_boolean(&json!(2)), None);
        assert_eq!(normalize_boolean(&json!(null)), None);
    }

    #[test]
    fn string_trims_and_maps_empty_to_none() {
        assert_eq!(
            normalize_string(&json!("  Casa na praia  ")),
            Some("Casa na praia".to_string())
        );
        assert_eq!(normalize_string(&json!("")), None);
        assert_eq!(normalize_string(&json!("   ")), None);
        assert_eq!(normalize_string(&json!(null)), None);
        assert_eq!(normalize_string(&json!(42)), Some("42".to_string()));
    }

    #[test]
    fn id_set_mixed_shapes() {
        let value = json!([{ "id": 3 }, 1, "2", { "amenidade_id": 1 }]);
        assert_eq!(normalize_id_set(&value), vec![1, 2, 3]);
    }

    #[test]
    fn id_set_drops_malformed_and_dedups() {
        let value = json!([{ "id": 1 }, { "id": 1 }, 2, { "nome": "piscina" }, "x", null]);
        assert_eq!(normalize_id_set(&value), vec![1, 2]);
    }

    #[test]
    fn id_set_order_insensitive() {
        assert_eq!(
            normalize_id_set(&json!([3, 1, 2])),
            normalize_id_set(&json!([2, 3, 1]))
        );
    }

    #[test]
    fn id_set_non_array_is_empty() {
        assert!(normalize_id_set(&json!(null)).is_empty());
        assert!(normalize_id_set(&json!(5)).is_empty());
        assert!(normalize_id_set(&json!({ "id": 5 })).is_empty());
    }
}
