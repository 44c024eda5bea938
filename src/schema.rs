//! Attribute schema types
//!
//! A schema is the ordered set of attribute descriptors a model was
//! trained against. It is persisted alongside the fitted classifier and
//! replayed identically at serving time.

use serde::{Deserialize, Serialize};

use crate::error::{ModelyardError, Result};

/// Kind of a dataset attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AttributeKind {
    Numeric,
    /// Categorical with an ordered domain of value labels
    Categorical { domain: Vec<String> },
}

impl AttributeKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, AttributeKind::Numeric)
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, AttributeKind::Categorical { .. })
    }
}

/// A single named column in a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttributeKind,
    /// 0-based ordinal position within the schema, stable across restarts
    pub index: usize,
}

impl AttributeDescriptor {
    pub fn numeric(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::Numeric,
            index,
        }
    }

    pub fn categorical(name: impl Into<String>, index: usize, domain: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::Categorical { domain },
            index,
        }
    }

    /// Position of a value label within this attribute's domain
    pub fn domain_index(&self, value: &str) -> Option<usize> {
        match &self.kind {
            AttributeKind::Numeric => None,
            AttributeKind::Categorical { domain } => domain.iter().position(|v| v == value),
        }
    }
}

/// Ordered sequence of attribute descriptors with one designated class
/// attribute (by convention the last one unless overridden at training
/// time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    relation: String,
    attributes: Vec<AttributeDescriptor>,
    class_index: usize,
}

impl AttributeSchema {
    /// Build a schema, defaulting the class attribute to the last column.
    pub fn new(
        relation: impl Into<String>,
        attributes: Vec<AttributeDescriptor>,
        class_index: Option<usize>,
    ) -> Result<Self> {
        if attributes.len() < 2 {
            return Err(ModelyardError::Dataset(format!(
                "schema needs at least two attributes (one feature and one class), got {}",
                attributes.len()
            )));
        }

        let class_index = class_index.unwrap_or(attributes.len() - 1);
        if class_index >= attributes.len() {
            return Err(ModelyardError::Validation(format!(
                "class index {} out of range for {} attributes",
                class_index,
                attributes.len()
            )));
        }

        for (i, attr) in attributes.iter().enumerate() {
            if attr.index != i {
                return Err(ModelyardError::Validation(format!(
                    "attribute '{}' declares index {} but sits at position {}",
                    attr.name, attr.index, i
                )));
            }
            if attributes[..i].iter().any(|a| a.name == attr.name) {
                return Err(ModelyardError::Validation(format!(
                    "duplicate attribute name '{}'",
                    attr.name
                )));
            }
        }

        Ok(Self {
            relation: relation.into(),
            attributes,
            class_index,
        })
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn attribute(&self, index: usize) -> Option<&AttributeDescriptor> {
        self.attributes.get(index)
    }

    pub fn class_index(&self) -> usize {
        self.class_index
    }

    pub fn class_attribute(&self) -> &AttributeDescriptor {
        &self.attributes[self.class_index]
    }

    /// Non-class attributes in schema order
    pub fn features(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        let class_index = self.class_index;
        self.attributes
            .iter()
            .filter(move |a| a.index != class_index)
    }

    pub fn n_features(&self) -> usize {
        self.attributes.len() - 1
    }

    /// Class domain labels. The class attribute must be categorical for
    /// classification, so a numeric class is a validation error.
    pub fn class_labels(&self) -> Result<&[String]> {
        match &self.class_attribute().kind {
            AttributeKind::Categorical { domain } => Ok(domain),
            AttributeKind::Numeric => Err(ModelyardError::Validation(format!(
                "class attribute '{}' is numeric; classification needs a categorical class",
                self.class_attribute().name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn risk_schema() -> AttributeSchema {
        AttributeSchema::new(
            "risk",
            vec![
                AttributeDescriptor::numeric("age", 0),
                AttributeDescriptor::numeric("income", 1),
                AttributeDescriptor::categorical(
                    "risk",
                    2,
                    vec!["low".into(), "medium".into(), "high".into()],
                ),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_class_defaults_to_last() {
        let schema = risk_schema();
        assert_eq!(schema.class_index(), 2);
        assert_eq!(schema.class_attribute().name, "risk");
        assert_eq!(schema.class_labels().unwrap().len(), 3);
    }

    #[test]
    fn test_features_exclude_class() {
        let schema = risk_schema();
        let names: Vec<&str> = schema.features().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["age", "income"]);
    }

    #[test]
    fn test_rejects_single_attribute() {
        let result = AttributeSchema::new(
            "bad",
            vec![AttributeDescriptor::numeric("only", 0)],
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let result = AttributeSchema::new(
            "bad",
            vec![
                AttributeDescriptor::numeric("a", 0),
                AttributeDescriptor::numeric("a", 1),
            ],
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_class_rejected() {
        let schema = AttributeSchema::new(
            "reg",
            vec![
                AttributeDescriptor::numeric("x", 0),
                AttributeDescriptor::numeric("y", 1),
            ],
            None,
        )
        .unwrap();
        assert!(schema.class_labels().is_err());
    }
}
