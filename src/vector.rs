//! Feature vector construction
//!
//! Converts a loosely-typed feature map into a row aligned with the
//! schema a model was trained against. Row length and ordering always
//! equal that schema; this is the invariant tying serving to training.

use std::collections::HashMap;

use ndarray::Array1;
use serde_json::Value;
use tracing::trace;

use crate::error::{ModelyardError, Result};
use crate::schema::{AttributeKind, AttributeSchema};

/// A prediction request's feature map: attribute name to JSON value.
pub type FeatureMap = HashMap<String, Value>;

pub struct FeatureVectorBuilder;

impl FeatureVectorBuilder {
    /// Build a feature row in schema order. Absent keys become missing
    /// slots; unknown categorical values pass through as missing so the
    /// classifier's own unknown-value policy applies; extra keys are
    /// ignored.
    pub fn build(features: &FeatureMap, schema: &AttributeSchema) -> Result<Array1<f64>> {
        let mut row = Vec::with_capacity(schema.n_features());
        for attr in schema.features() {
            let slot = match features.get(&attr.name) {
                None => f64::NAN,
                Some(value) => match &attr.kind {
                    AttributeKind::Numeric => coerce_numeric(value, &attr.name)?,
                    AttributeKind::Categorical { domain } => {
                        let text = value_text(value);
                        match domain.iter().position(|v| *v == text) {
                            Some(i) => i as f64,
                            None => {
                                trace!(attribute = %attr.name, value = %text,
                                       "unseen categorical value treated as missing");
                                f64::NAN
                            }
                        }
                    }
                },
            };
            row.push(slot);
        }
        Ok(Array1::from_vec(row))
    }
}

fn coerce_numeric(value: &Value, attribute: &str) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| {
            ModelyardError::Validation(format!(
                "value {} for attribute '{}' is not representable as f64",
                n, attribute
            ))
        }),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            ModelyardError::Validation(format!(
                "value '{}' for numeric attribute '{}' is not a number",
                s, attribute
            ))
        }),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(ModelyardError::Validation(format!(
            "unsupported value {} for numeric attribute '{}'",
            other, attribute
        ))),
    }
}

/// String form of a feature value, matching how categorical domains are
/// recorded at load time.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeDescriptor;
    use serde_json::json;

    fn risk_schema() -> AttributeSchema {
        AttributeSchema::new(
            "risk",
            vec![
                AttributeDescriptor::numeric("age", 0),
                AttributeDescriptor::categorical(
                    "sector",
                    1,
                    vec!["retail".into(), "industrial".into()],
                ),
                AttributeDescriptor::categorical("risk", 2, vec!["low".into(), "high".into()]),
            ],
            None,
        )
        .unwrap()
    }

    fn map(pairs: &[(&str, Value)]) -> FeatureMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_row_matches_schema_order_and_length() {
        let schema = risk_schema();
        let features = map(&[("sector", json!("industrial")), ("age", json!(41))]);
        let row = FeatureVectorBuilder::build(&features, &schema).unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row[0], 41.0);
        assert_eq!(row[1], 1.0);
    }

    #[test]
    fn test_missing_keys_become_missing_slots() {
        let schema = risk_schema();
        let row = FeatureVectorBuilder::build(&map(&[]), &schema).unwrap();
        assert_eq!(row.len(), 2);
        assert!(row.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_extra_keys_ignored() {
        let schema = risk_schema();
        let features = map(&[("age", json!(30)), ("unknown_column", json!("x"))]);
        let row = FeatureVectorBuilder::build(&features, &schema).unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row[0], 30.0);
    }

    #[test]
    fn test_numeric_string_coerced() {
        let schema = risk_schema();
        let features = map(&[("age", json!("27.5"))]);
        let row = FeatureVectorBuilder::build(&features, &schema).unwrap();
        assert_eq!(row[0], 27.5);
    }

    #[test]
    fn test_unparseable_numeric_rejected() {
        let schema = risk_schema();
        let features = map(&[("age", json!("not-a-number"))]);
        let err = FeatureVectorBuilder::build(&features, &schema).unwrap_err();
        assert!(matches!(err, ModelyardError::Validation(_)));
    }

    #[test]
    fn test_unseen_category_passes_through_as_missing() {
        let schema = risk_schema();
        let features = map(&[("sector", json!("agriculture"))]);
        let row = FeatureVectorBuilder::build(&features, &schema).unwrap();
        assert!(row[1].is_nan());
    }

    #[test]
    fn test_numeric_value_for_categorical_uses_string_form() {
        let schema = AttributeSchema::new(
            "codes",
            vec![
                AttributeDescriptor::categorical("code", 0, vec!["1".into(), "2".into()]),
                AttributeDescriptor::categorical("class", 1, vec!["a".into(), "b".into()]),
            ],
            None,
        )
        .unwrap();
        let features = map(&[("code", json!(2))]);
        let row = FeatureVectorBuilder::build(&features, &schema).unwrap();
        assert_eq!(row[0], 1.0);
    }
}
