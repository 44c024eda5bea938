//! Dataset loading
//!
//! Two training input formats are accepted: self-describing ARFF
//! (attribute kinds declared inline) and plain delimited text with a
//! header row, for which kinds are inferred. A column is numeric when
//! every non-empty value parses as a number; otherwise it is
//! categorical with its domain in first-seen order.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::Array2;
use tracing::debug;

use crate::error::{ModelyardError, Result};
use crate::schema::{AttributeDescriptor, AttributeKind, AttributeSchema};

use super::Dataset;

/// Parses a tabular source into rows conforming to a schema.
pub struct DatasetLoader;

impl DatasetLoader {
    /// Load a dataset from a file, sniffing ARFF vs. delimited text.
    /// `class_index` overrides the last-column default when given.
    pub fn load(path: &Path, class_index: Option<usize>) -> Result<Dataset> {
        let file = File::open(path).map_err(|e| {
            ModelyardError::Dataset(format!("cannot open {}: {}", path.display(), e))
        })?;
        let reader = BufReader::new(file);
        let lines: Vec<String> = reader
            .lines()
            .collect::<std::io::Result<_>>()
            .map_err(|e| ModelyardError::Dataset(e.to_string()))?;

        let first = lines
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty() && !l.starts_with('%'));
        match first {
            None => Err(ModelyardError::Dataset(format!(
                "empty dataset source: {}",
                path.display()
            ))),
            Some(l) if l.to_ascii_lowercase().starts_with("@relation") => {
                debug!(path = %path.display(), "loading ARFF dataset");
                Self::parse_arff(&lines, class_index)
            }
            Some(_) => {
                debug!(path = %path.display(), "loading delimited dataset");
                Self::parse_delimited(path, class_index)
            }
        }
    }

    fn parse_arff(lines: &[String], class_index: Option<usize>) -> Result<Dataset> {
        let mut relation = String::from("unnamed");
        let mut attributes: Vec<AttributeDescriptor> = Vec::new();
        let mut data_lines: Vec<&str> = Vec::new();
        let mut in_data = false;

        for raw in lines {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('%') {
                continue;
            }
            if in_data {
                data_lines.push(line);
                continue;
            }
            let lower = line.to_ascii_lowercase();
            if lower.starts_with("@relation") {
                relation = unquote(line["@relation".len()..].trim()).to_string();
            } else if lower.starts_with("@attribute") {
                let decl = line["@attribute".len()..].trim();
                attributes.push(Self::parse_arff_attribute(decl, attributes.len())?);
            } else if lower.starts_with("@data") {
                in_data = true;
            }
        }

        let schema = AttributeSchema::new(relation, attributes, class_index)?;
        if data_lines.is_empty() {
            return Err(ModelyardError::Dataset(
                "ARFF source declares no data rows".to_string(),
            ));
        }

        let n_cols = schema.len();
        let mut values = Vec::with_capacity(data_lines.len() * n_cols);
        for line in &data_lines {
            let cells = split_csv_line(line);
            if cells.len() != n_cols {
                return Err(ModelyardError::Dataset(format!(
                    "row has {} values, schema declares {} attributes: {}",
                    cells.len(),
                    n_cols,
                    line
                )));
            }
            for (col, cell) in cells.iter().enumerate() {
                values.push(Self::encode_value(cell, &schema.attributes()[col])?);
            }
        }

        let rows = Array2::from_shape_vec((data_lines.len(), n_cols), values)
            .map_err(|e| ModelyardError::Dataset(e.to_string()))?;
        Dataset::new(schema, rows)
    }

    fn parse_arff_attribute(decl: &str, index: usize) -> Result<AttributeDescriptor> {
        let (name, spec) = if let Some(stripped) = decl.strip_prefix('\'') {
            let end = stripped.find('\'').ok_or_else(|| {
                ModelyardError::Dataset(format!("unterminated attribute name: {}", decl))
            })?;
            (stripped[..end].to_string(), stripped[end + 1..].trim())
        } else {
            let mut parts = decl.splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or_default().to_string();
            (name, parts.next().unwrap_or_default().trim())
        };

        if name.is_empty() || spec.is_empty() {
            return Err(ModelyardError::Dataset(format!(
                "malformed @attribute declaration: {}",
                decl
            )));
        }

        let kind = if spec.starts_with('{') {
            let inner = spec
                .trim_start_matches('{')
                .trim_end_matches('}')
                .trim();
            let domain: Vec<String> = split_csv_line(inner)
                .into_iter()
                .map(|v| unquote(&v).to_string())
                .collect();
            if domain.is_empty() {
                return Err(ModelyardError::Dataset(format!(
                    "categorical attribute '{}' has an empty domain",
                    name
                )));
            }
            AttributeKind::Categorical { domain }
        } else {
            match spec.to_ascii_lowercase().as_str() {
                "numeric" | "real" | "integer" => AttributeKind::Numeric,
                other => {
                    return Err(ModelyardError::Dataset(format!(
                        "unsupported attribute type '{}' for '{}'",
                        other, name
                    )))
                }
            }
        };

        Ok(AttributeDescriptor { name, kind, index })
    }

    fn parse_delimited(path: &Path, class_index: Option<usize>) -> Result<Dataset> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| ModelyardError::Dataset(e.to_string()))?;

        let header: Vec<String> = reader
            .headers()
            .map_err(|e| ModelyardError::Dataset(e.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect();
        if header.len() < 2 {
            return Err(ModelyardError::Dataset(format!(
                "need at least one feature and one class column, header has {}",
                header.len()
            )));
        }

        let mut records: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ModelyardError::Dataset(e.to_string()))?;
            if record.len() != header.len() {
                return Err(ModelyardError::Dataset(format!(
                    "row {} has {} values, header declares {}",
                    records.len() + 1,
                    record.len(),
                    header.len()
                )));
            }
            records.push(record.iter().map(|c| c.to_string()).collect());
        }
        if records.is_empty() {
            return Err(ModelyardError::Dataset(format!(
                "no data rows in {}",
                path.display()
            )));
        }

        // Infer each column's kind from the observed values.
        let mut attributes = Vec::with_capacity(header.len());
        for (col, name) in header.iter().enumerate() {
            let numeric = records.iter().all(|row| {
                let cell = &row[col];
                is_missing(cell) || cell.parse::<f64>().is_ok()
            });
            let kind = if numeric {
                AttributeKind::Numeric
            } else {
                let mut domain: Vec<String> = Vec::new();
                for row in &records {
                    let cell = &row[col];
                    if !is_missing(cell) && !domain.iter().any(|v| v == cell) {
                        domain.push(cell.clone());
                    }
                }
                AttributeKind::Categorical { domain }
            };
            attributes.push(AttributeDescriptor {
                name: name.clone(),
                kind,
                index: col,
            });
        }

        let relation = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "dataset".to_string());
        let schema = AttributeSchema::new(relation, attributes, class_index)?;

        let n_cols = schema.len();
        let mut values = Vec::with_capacity(records.len() * n_cols);
        for row in &records {
            for (col, cell) in row.iter().enumerate() {
                values.push(Self::encode_value(cell, &schema.attributes()[col])?);
            }
        }
        let rows = Array2::from_shape_vec((records.len(), n_cols), values)
            .map_err(|e| ModelyardError::Dataset(e.to_string()))?;
        Dataset::new(schema, rows)
    }

    /// Encode one cell against its descriptor: raw number, domain index,
    /// or NaN for missing.
    fn encode_value(cell: &str, attr: &AttributeDescriptor) -> Result<f64> {
        let cell = unquote(cell.trim());
        if is_missing(cell) {
            return Ok(f64::NAN);
        }
        match &attr.kind {
            AttributeKind::Numeric => cell.parse::<f64>().map_err(|_| {
                ModelyardError::Dataset(format!(
                    "value '{}' is not numeric for attribute '{}'",
                    cell, attr.name
                ))
            }),
            AttributeKind::Categorical { domain } => domain
                .iter()
                .position(|v| v == cell)
                .map(|i| i as f64)
                .ok_or_else(|| {
                    ModelyardError::Dataset(format!(
                        "value '{}' not in domain of attribute '{}'",
                        cell, attr.name
                    ))
                }),
        }
    }
}

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || cell == "?"
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('\'') && s.ends_with('\'')) || (s.starts_with('"') && s.ends_with('"')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Split on commas outside quotes, so quoted nominal values may contain
/// commas.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in line.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                ',' => {
                    cells.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    cells.push(current.trim().to_string());
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn test_load_arff() {
        let file = write_temp(
            "@relation risk\n\
             @attribute age numeric\n\
             @attribute risk {low,medium,high}\n\
             @data\n\
             25,medium\n\
             45,low\n\
             ?,high\n",
        );
        let data = DatasetLoader::load(file.path(), None).unwrap();
        assert_eq!(data.schema().relation(), "risk");
        assert_eq!(data.n_rows(), 3);
        assert_eq!(data.row(0)[1], 1.0);
        assert!(data.row(2)[0].is_nan());
    }

    #[test]
    fn test_load_csv_infers_kinds() {
        let file = write_temp("age,income,risk\n25,30000,medium\n45,80000,low\n35,45000,high\n");
        let data = DatasetLoader::load(file.path(), None).unwrap();
        assert!(data.schema().attributes()[0].kind.is_numeric());
        assert!(data.schema().attributes()[2].kind.is_categorical());
        // Domain in first-seen order
        assert_eq!(
            data.schema().class_labels().unwrap(),
            &["medium".to_string(), "low".to_string(), "high".to_string()]
        );
    }

    #[test]
    fn test_arff_quoted_values_with_commas() {
        let file = write_temp(
            "@relation cities\n\
             @attribute city {'new york, ny','boston, ma'}\n\
             @attribute class {yes,no}\n\
             @data\n\
             'new york, ny',yes\n\
             'boston, ma',no\n",
        );
        let data = DatasetLoader::load(file.path(), None).unwrap();
        let attr = &data.schema().attributes()[0];
        assert_eq!(attr.domain_index("new york, ny"), Some(0));
        assert_eq!(attr.domain_index("boston, ma"), Some(1));
        assert_eq!(data.row(1)[0], 1.0);
    }

    #[test]
    fn test_csv_class_index_override() {
        let file = write_temp("label,x\nyes,1\nno,2\n");
        let data = DatasetLoader::load(file.path(), Some(0)).unwrap();
        assert_eq!(data.schema().class_attribute().name, "label");
    }

    #[test]
    fn test_empty_source_rejected() {
        let file = write_temp("");
        assert!(DatasetLoader::load(file.path(), None).is_err());
    }

    #[test]
    fn test_zero_rows_rejected() {
        let file = write_temp("a,b\n");
        assert!(DatasetLoader::load(file.path(), None).is_err());
    }

    #[test]
    fn test_single_column_rejected() {
        let file = write_temp("only\n1\n2\n");
        assert!(DatasetLoader::load(file.path(), None).is_err());
    }

    #[test]
    fn test_arff_written_by_dataset_reloads() {
        let file = write_temp("age,risk\n25,medium\n45,low\n");
        let data = DatasetLoader::load(file.path(), None).unwrap();
        let round = write_temp(&data.to_arff());
        let reloaded = DatasetLoader::load(round.path(), None).unwrap();
        assert_eq!(reloaded.schema(), data.schema());
        assert_eq!(reloaded.n_rows(), 2);
    }
}
