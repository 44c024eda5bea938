//! Datasets: a schema plus row-major data
//!
//! Rows are stored as a dense `Array2<f64>`. Numeric slots hold the raw
//! value, categorical slots hold the 0-based index into the attribute's
//! domain, and missing slots hold NaN.

mod loader;

pub use loader::DatasetLoader;

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{ModelyardError, Result};
use crate::schema::{AttributeKind, AttributeSchema};

/// A labeled tabular dataset conforming to an [`AttributeSchema`].
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: AttributeSchema,
    rows: Array2<f64>,
}

impl Dataset {
    pub fn new(schema: AttributeSchema, rows: Array2<f64>) -> Result<Self> {
        if rows.ncols() != schema.len() {
            return Err(ModelyardError::Dataset(format!(
                "row width {} does not match schema with {} attributes",
                rows.ncols(),
                schema.len()
            )));
        }
        if rows.nrows() == 0 {
            return Err(ModelyardError::Dataset(
                "dataset has no rows".to_string(),
            ));
        }
        Ok(Self { schema, rows })
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    pub fn n_rows(&self) -> usize {
        self.rows.nrows()
    }

    pub fn n_attributes(&self) -> usize {
        self.schema.len()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.rows.row(index)
    }

    /// Feature slots of one row, class column removed, schema order kept.
    pub fn feature_row(&self, index: usize) -> Array1<f64> {
        let class_index = self.schema.class_index();
        let row = self.rows.row(index);
        Array1::from_iter(
            row.iter()
                .enumerate()
                .filter(|(i, _)| *i != class_index)
                .map(|(_, &v)| v),
        )
    }

    /// Feature matrix and class indices for every row whose class value
    /// is present. Rows with a missing class are skipped, matching the
    /// usual treatment of unlabeled instances at training time.
    pub fn labeled(&self) -> Result<(Array2<f64>, Vec<usize>)> {
        let labels = self.schema.class_labels()?;
        let class_index = self.schema.class_index();
        let n_features = self.schema.n_features();

        let mut x = Vec::new();
        let mut y = Vec::new();
        for row in self.rows.rows() {
            let class_value = row[class_index];
            if class_value.is_nan() {
                continue;
            }
            let label = class_value as usize;
            if label >= labels.len() {
                return Err(ModelyardError::Dataset(format!(
                    "class value {} outside domain of size {}",
                    label,
                    labels.len()
                )));
            }
            y.push(label);
            x.extend(
                row.iter()
                    .enumerate()
                    .filter(|(i, _)| *i != class_index)
                    .map(|(_, &v)| v),
            );
        }

        if y.is_empty() {
            return Err(ModelyardError::Dataset(
                "dataset has no rows with a class value".to_string(),
            ));
        }

        let features = Array2::from_shape_vec((y.len(), n_features), x)
            .map_err(|e| ModelyardError::Dataset(e.to_string()))?;
        Ok((features, y))
    }

    /// New dataset containing only the given row indices (shared schema).
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        let n_cols = self.rows.ncols();
        let rows = Array2::from_shape_fn((indices.len(), n_cols), |(r, c)| {
            self.rows[[indices[r], c]]
        });
        Dataset {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// String form of one slot: the raw number for numeric attributes,
    /// the domain label for categorical ones, `None` when missing.
    pub fn display_value(&self, row: usize, col: usize) -> Option<String> {
        let v = self.rows[[row, col]];
        if v.is_nan() {
            return None;
        }
        match &self.schema.attributes()[col].kind {
            AttributeKind::Numeric => Some(format_numeric(v)),
            AttributeKind::Categorical { domain } => domain.get(v as usize).cloned(),
        }
    }

    /// Render as ARFF text, the self-describing training format.
    pub fn to_arff(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("@relation {}\n\n", self.schema.relation()));
        for attr in self.schema.attributes() {
            match &attr.kind {
                AttributeKind::Numeric => {
                    out.push_str(&format!("@attribute {} numeric\n", attr.name));
                }
                AttributeKind::Categorical { domain } => {
                    out.push_str(&format!(
                        "@attribute {} {{{}}}\n",
                        attr.name,
                        domain.join(",")
                    ));
                }
            }
        }
        out.push_str("\n@data\n");
        for r in 0..self.n_rows() {
            let cells: Vec<String> = (0..self.schema.len())
                .map(|c| self.display_value(r, c).unwrap_or_else(|| "?".to_string()))
                .collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }
}

fn format_numeric(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeDescriptor;
    use ndarray::array;

    fn weather_dataset() -> Dataset {
        let schema = AttributeSchema::new(
            "weather",
            vec![
                AttributeDescriptor::numeric("temperature", 0),
                AttributeDescriptor::categorical(
                    "outlook",
                    1,
                    vec!["sunny".into(), "rainy".into()],
                ),
                AttributeDescriptor::categorical("play", 2, vec!["yes".into(), "no".into()]),
            ],
            None,
        )
        .unwrap();
        let rows = array![
            [25.0, 0.0, 0.0],
            [12.0, 1.0, 1.0],
            [f64::NAN, 0.0, 0.0],
            [18.0, 1.0, f64::NAN],
        ];
        Dataset::new(schema, rows).unwrap()
    }

    #[test]
    fn test_feature_row_drops_class() {
        let data = weather_dataset();
        let row = data.feature_row(0);
        assert_eq!(row.len(), 2);
        assert_eq!(row[0], 25.0);
    }

    #[test]
    fn test_labeled_skips_missing_class() {
        let data = weather_dataset();
        let (x, y) = data.labeled().unwrap();
        assert_eq!(x.nrows(), 3);
        assert_eq!(y, vec![0, 1, 0]);
    }

    #[test]
    fn test_subset() {
        let data = weather_dataset();
        let sub = data.subset(&[0, 2]);
        assert_eq!(sub.n_rows(), 2);
        assert!(sub.row(1)[0].is_nan());
    }

    #[test]
    fn test_arff_round_trip_text() {
        let data = weather_dataset();
        let arff = data.to_arff();
        assert!(arff.contains("@relation weather"));
        assert!(arff.contains("@attribute outlook {sunny,rainy}"));
        assert!(arff.contains("?,sunny,yes"));
    }
}
