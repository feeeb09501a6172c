//! Declarative schema manifests.
//!
//! A manifest is a YAML or JSON file describing the models to register,
//! mirroring the [`FieldOptions`] vocabulary. It is the non-interactive
//! frontend consumed by the CLI: load the file, apply it to a store and
//! registry, then hand the registry to the generator.

use crate::schema::metadata::{FieldOptions, FieldType, MetadataStore, ModelOptions};
use crate::schema::registry::ModelRegistry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;
use tracing::info;

/// Root of a schema manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaManifest {
    pub models: Vec<ModelManifest>,
}

/// One model entry in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FieldManifest>,
}

/// One field entry in a manifest. Field semantics match [`FieldOptions`]:
/// anything omitted falls back to the same defaults the builder applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldManifest {
    pub name: String,
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub field_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

impl FieldManifest {
    fn to_options(&self) -> FieldOptions {
        FieldOptions {
            field_type: self.field_type.clone(),
            column: self.column.clone(),
            required: self.required,
            unique: self.unique,
            enum_values: self.enum_values.clone(),
            default_value: self.default.clone(),
            primary_key: self.primary_key,
            auto_increment: self.auto_increment,
            reference_target: self.references.clone(),
        }
        .normalize_reference()
    }
}

impl FieldOptions {
    /// A `references` entry without an explicit type is a reference field.
    fn normalize_reference(mut self) -> Self {
        if self.reference_target.is_some() && self.field_type.is_none() {
            self.field_type = Some(FieldType::Reference);
        }
        self
    }
}

impl SchemaManifest {
    /// Load a manifest from a YAML (`.yaml`/`.yml`) or JSON (`.json`) file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("schema manifest {:?} does not exist", path);
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read schema manifest {:?}", path))?;
        let ext = path
            .extension()
            .and_then(|os| os.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let manifest: SchemaManifest = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("failed to parse YAML manifest {:?}", path))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse JSON manifest {:?}", path))?,
            other => anyhow::bail!("unsupported manifest extension: {other}"),
        };
        Ok(manifest)
    }

    /// Register every model described by this manifest.
    ///
    /// Declaration order within each model is preserved; registration
    /// failures surface the underlying [`crate::error::SchemaError`].
    pub fn apply(
        &self,
        store: &mut MetadataStore,
        registry: &mut ModelRegistry,
    ) -> Result<usize> {
        for model in &self.models {
            let handle = store.declare_model();
            let mut options = ModelOptions::new(model.name.clone());
            options.table_name = model.table_name.clone();
            options.description = model.description.clone();
            store.attach_model_metadata(handle, options);

            for field in &model.fields {
                store.attach_field_metadata(handle, &field.name, field.to_options());
            }

            registry
                .register_model(store, handle)
                .with_context(|| format!("failed to register model '{}'", model.name))?;
        }
        info!(models = self.models.len(), "applied schema manifest");
        Ok(self.models.len())
    }
}
