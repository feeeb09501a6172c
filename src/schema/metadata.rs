//! Declaration-time model and field metadata.
//!
//! The store keeps metadata keyed by an opaque [`ModelHandle`] rather than
//! by display name, so two distinct declarations may share a name without
//! colliding. Handles can be chained to a parent, in which case field
//! metadata accumulates along the chain parent-first. This layer performs
//! no validation; the registry does that at registration time.

use crate::naming::to_snake_case;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;

/// Abstract field types understood by the generator.
///
/// The mapping to backend storage types lives in `codegen::types`; this
/// enum only records what the caller declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Reference,
    Array(Box<FieldType>),
}

impl FieldType {
    /// Convenience constructor for array fields.
    pub fn array_of(element: FieldType) -> Self {
        FieldType::Array(Box::new(element))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Number => write!(f, "number"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Date => write!(f, "date"),
            FieldType::Reference => write!(f, "reference"),
            FieldType::Array(element) => write!(f, "array<{element}>"),
        }
    }
}

/// Opaque identifier for one model declaration.
///
/// Minted by [`MetadataStore::declare_model`]; stable for the lifetime of
/// the store that minted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelHandle(u64);

impl ModelHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

/// Model-level metadata supplied at declaration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOptions {
    /// Model identifier, unique per registry.
    pub name: String,
    /// Storage table override; derived from `name` when absent.
    pub table_name: Option<String>,
    /// Free-form description carried into generated doc comments.
    pub description: Option<String>,
}

impl ModelOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            description: None,
        }
    }

    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Per-field declaration options.
///
/// Everything is optional; [`FieldMetadata`] normalization fills the
/// defaults (type `String`, `required` true, storage column from the
/// property name).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldOptions {
    pub field_type: Option<FieldType>,
    pub column: Option<String>,
    pub required: Option<bool>,
    pub unique: bool,
    pub enum_values: Option<Vec<String>>,
    pub default_value: Option<JsonValue>,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub reference_target: Option<String>,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = Some(false);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn default_value(mut self, value: JsonValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Declare a many-to-one reference to another model. Sets the field
    /// type to `Reference` unless an array type was declared first.
    pub fn references(mut self, target: impl Into<String>) -> Self {
        if self.field_type.is_none() {
            self.field_type = Some(FieldType::Reference);
        }
        self.reference_target = Some(target.into());
        self
    }
}

/// Normalized per-property metadata.
///
/// Every field carries exactly one type; declarations that omit the type
/// default to `String`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub name: String,
    pub storage_column: String,
    pub field_type: FieldType,
    pub required: bool,
    pub unique: bool,
    pub enum_values: Option<Vec<String>>,
    pub default_value: Option<JsonValue>,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub reference_target: Option<String>,
}

impl FieldMetadata {
    fn from_options(property: &str, options: FieldOptions) -> Self {
        let storage_column = options
            .column
            .unwrap_or_else(|| to_snake_case(property));
        Self {
            name: property.to_string(),
            storage_column,
            field_type: options.field_type.unwrap_or(FieldType::String),
            required: options.required.unwrap_or(true),
            unique: options.unique,
            enum_values: options.enum_values,
            default_value: options.default_value,
            primary_key: options.primary_key,
            auto_increment: options.auto_increment,
            reference_target: options.reference_target,
        }
    }
}

/// Model-level metadata as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub table_name: Option<String>,
    pub description: Option<String>,
}

/// Accumulates declaration-time metadata, keyed by handle.
#[derive(Debug, Default)]
pub struct MetadataStore {
    next_id: u64,
    parents: HashMap<ModelHandle, ModelHandle>,
    models: HashMap<ModelHandle, ModelMetadata>,
    fields: HashMap<ModelHandle, Vec<FieldMetadata>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh handle with no metadata attached.
    pub fn declare_model(&mut self) -> ModelHandle {
        let handle = ModelHandle(self.next_id);
        self.next_id += 1;
        handle
    }

    /// Mint a handle whose field metadata extends `parent`'s.
    pub fn declare_child_model(&mut self, parent: ModelHandle) -> ModelHandle {
        let handle = self.declare_model();
        self.parents.insert(handle, parent);
        handle
    }

    /// Attach (or replace) model-level metadata for `handle`.
    pub fn attach_model_metadata(&mut self, handle: ModelHandle, options: ModelOptions) {
        self.models.insert(
            handle,
            ModelMetadata {
                name: options.name,
                table_name: options.table_name,
                description: options.description,
            },
        );
    }

    /// Attach field metadata for one property of `handle`, in declaration
    /// order.
    pub fn attach_field_metadata(
        &mut self,
        handle: ModelHandle,
        property: &str,
        options: FieldOptions,
    ) {
        self.fields
            .entry(handle)
            .or_default()
            .push(FieldMetadata::from_options(property, options));
    }

    /// Model-level metadata for `handle`, if any was attached.
    pub fn read_model_metadata(&self, handle: ModelHandle) -> Option<&ModelMetadata> {
        self.models.get(&handle)
    }

    /// All field metadata visible on `handle`, walking the inheritance
    /// chain parent-first. Empty when nothing was attached anywhere on the
    /// chain.
    pub fn read_field_metadata(&self, handle: ModelHandle) -> Vec<FieldMetadata> {
        let mut chain = Vec::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            chain.push(h);
            current = self.parents.get(&h).copied();
        }
        chain
            .into_iter()
            .rev()
            .flat_map(|h| self.fields.get(&h).into_iter().flatten().cloned())
            .collect()
    }
}
