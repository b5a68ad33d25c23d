use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use glob::glob;
use serde::{Deserialize, Serialize};

use crate::error::{HeadlessError, Result};
use crate::models::{DimensionDefinition, MeasureDefinition, MetricDefinition};

/// One schema document as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    pub name: Option<String>,
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
    #[serde(default)]
    pub measures: Vec<MeasureDefinition>,
    #[serde(default)]
    pub dimensions: Vec<DimensionDefinition>,
    /// Raw field names available to field-defined metrics.
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Metric, measure and dimension definitions available to one compilation.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    metrics: Vec<MetricDefinition>,
    measures: HashMap<String, MeasureDefinition>,
    dimensions: Vec<DimensionDefinition>,
    fields: BTreeSet<String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        metrics: Vec<MetricDefinition>,
        measures: Vec<MeasureDefinition>,
        dimensions: Vec<DimensionDefinition>,
        fields: Vec<String>,
    ) -> Self {
        let mut registry = SchemaRegistry::new();
        registry.merge(SchemaDocument {
            name: None,
            metrics,
            measures,
            dimensions,
            fields,
        });
        registry
    }

    /// Load every `*.yml` / `*.yaml` schema document in `root`.
    pub fn load_from_dir<P: AsRef<Path>>(root: P) -> Result<Self> {
        let dir = root.as_ref();
        if !dir.exists() {
            return Err(HeadlessError::Validation(format!(
                "schema directory not found: {}",
                dir.display()
            )));
        }
        let mut registry = SchemaRegistry::new();
        for ext in ["yml", "yaml"] {
            for entry in glob(&format!("{}/*.{ext}", dir.display()))
                .map_err(|e| HeadlessError::Other(e.into()))?
                .flatten()
            {
                registry.load_file(&entry)?;
            }
        }
        Ok(registry)
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        let doc: SchemaDocument = serde_yaml::from_str(&contents)?;
        tracing::debug!(
            path = %path.display(),
            metrics = doc.metrics.len(),
            measures = doc.measures.len(),
            dimensions = doc.dimensions.len(),
            "loaded schema document"
        );
        self.merge(doc);
        Ok(())
    }

    pub fn merge(&mut self, doc: SchemaDocument) {
        self.metrics.extend(doc.metrics);
        for measure in doc.measures {
            self.measures.insert(measure.biz_name.clone(), measure);
        }
        self.dimensions.extend(doc.dimensions);
        self.fields.extend(doc.fields);
    }

    /// Case-insensitive lookup by biz name.
    pub fn find_metric(&self, biz_name: &str) -> Option<&MetricDefinition> {
        self.metrics
            .iter()
            .find(|m| m.biz_name.eq_ignore_ascii_case(biz_name))
    }

    pub fn get_measure(&self, biz_name: &str) -> Option<&MeasureDefinition> {
        self.measures.get(biz_name)
    }

    pub fn find_dimension(&self, biz_name: &str) -> Option<&DimensionDefinition> {
        self.dimensions.iter().find(|d| d.biz_name == biz_name)
    }

    /// Declared fields plus every dimension and measure biz name.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains(name)
            || self.measures.contains_key(name)
            || self.find_dimension(name).is_some()
    }

    pub fn metrics(&self) -> &[MetricDefinition] {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AggOperator, MetricDefineType};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_parts(
            vec![MetricDefinition::new(
                "ArpU",
                MetricDefineType::Metric,
                "revenue / users",
            )],
            vec![MeasureDefinition::new("revenue", AggOperator::Sum)],
            vec![DimensionDefinition::new("city")],
            vec!["price".to_string()],
        )
    }

    #[test]
    fn metric_lookup_ignores_case() {
        let reg = registry();
        assert_eq!(reg.find_metric("arpu").unwrap().biz_name, "ArpU");
        assert!(reg.find_metric("missing").is_none());
    }

    #[test]
    fn dimension_lookup_is_exact() {
        let reg = registry();
        assert!(reg.find_dimension("city").is_some());
        assert!(reg.find_dimension("City").is_none());
    }

    #[test]
    fn fields_include_dimensions_and_measures() {
        let reg = registry();
        assert!(reg.has_field("price"));
        assert!(reg.has_field("city"));
        assert!(reg.has_field("revenue"));
        assert!(!reg.has_field("arpu"));
    }
}
