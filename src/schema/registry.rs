//! Normalized entity registry.
//!
//! Registration validates the raw metadata captured by the store, derives
//! the storage table name and relation list, and keeps one
//! [`EntityDefinition`] per model name. Re-registering a name replaces the
//! prior definition wholesale, relations included.

use crate::error::SchemaError;
use crate::naming::to_snake_case;
use crate::schema::metadata::{FieldMetadata, FieldType, MetadataStore, ModelHandle};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind of a derived relation. Only many-to-one exists today; reference
/// fields always point at a single parent row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    ManyToOne,
}

/// A relation derived from a reference-typed field.
///
/// Never declared directly: computed at registration time and recomputed
/// wholesale whenever the model is re-registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDefinition {
    pub name: String,
    pub target_entity: String,
    pub kind: RelationKind,
    pub foreign_key: String,
}

/// Normalized description of one registered model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    pub table_name: String,
    pub description: Option<String>,
    pub fields: Vec<FieldMetadata>,
    pub relations: Vec<RelationDefinition>,
}

/// Name-keyed map of entity definitions.
///
/// Owned by whoever constructed it; there is no process-wide instance, so
/// independent configurations can coexist and tests need no shared reset.
/// Iteration follows insertion order, which callers may rely on only for
/// deterministic fixtures.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: IndexMap<String, EntityDefinition>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `handle`'s metadata and store the resulting definition.
    ///
    /// Fails with [`SchemaError::MissingModelMetadata`] when no model
    /// metadata was attached, and [`SchemaError::MissingFieldMetadata`]
    /// when the field list is empty. An existing definition under the same
    /// name is overwritten.
    pub fn register_model(
        &mut self,
        store: &MetadataStore,
        handle: ModelHandle,
    ) -> Result<(), SchemaError> {
        let model = store
            .read_model_metadata(handle)
            .ok_or(SchemaError::MissingModelMetadata { handle: handle.id() })?;

        let fields = store.read_field_metadata(handle);
        if fields.is_empty() {
            return Err(SchemaError::MissingFieldMetadata {
                model: model.name.clone(),
            });
        }

        let table_name = model
            .table_name
            .clone()
            .unwrap_or_else(|| to_snake_case(&model.name));
        let relations = derive_relations(&fields);

        debug!(
            model = %model.name,
            table = %table_name,
            fields = fields.len(),
            relations = relations.len(),
            "registered model"
        );

        self.models.insert(
            model.name.clone(),
            EntityDefinition {
                name: model.name.clone(),
                table_name,
                description: model.description.clone(),
                fields,
                relations,
            },
        );
        Ok(())
    }

    /// Look up a definition by model name. Absence is a normal query
    /// outcome, not an error.
    pub fn get_model(&self, name: &str) -> Option<&EntityDefinition> {
        self.models.get(name)
    }

    pub fn all_models(&self) -> impl Iterator<Item = &EntityDefinition> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Drop every registration. Intended for test isolation.
    pub fn clear(&mut self) {
        self.models.clear();
    }
}

/// Synthesize one many-to-one relation per reference field with a target.
fn derive_relations(fields: &[FieldMetadata]) -> Vec<RelationDefinition> {
    fields
        .iter()
        .filter(|field| field.field_type == FieldType::Reference)
        .filter_map(|field| {
            let target = field.reference_target.as_ref()?;
            Some(RelationDefinition {
                name: field.name.clone(),
                target_entity: target.clone(),
                kind: RelationKind::ManyToOne,
                foreign_key: field.storage_column.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::metadata::{FieldOptions, ModelOptions};
    use assert_matches::assert_matches;

    fn store_with_product() -> (MetadataStore, ModelHandle) {
        let mut store = MetadataStore::new();
        let handle = store.declare_model();
        store.attach_model_metadata(handle, ModelOptions::new("Product"));
        store.attach_field_metadata(
            handle,
            "id",
            FieldOptions::new()
                .field_type(FieldType::Number)
                .primary_key()
                .auto_increment(),
        );
        store.attach_field_metadata(handle, "name", FieldOptions::new());
        (store, handle)
    }

    #[test]
    fn registration_requires_model_metadata() {
        let mut store = MetadataStore::new();
        let handle = store.declare_model();
        store.attach_field_metadata(handle, "name", FieldOptions::new());

        let mut registry = ModelRegistry::new();
        assert_matches!(
            registry.register_model(&store, handle),
            Err(SchemaError::MissingModelMetadata { .. })
        );
    }

    #[test]
    fn registration_requires_at_least_one_field() {
        let mut store = MetadataStore::new();
        let handle = store.declare_model();
        store.attach_model_metadata(handle, ModelOptions::new("Empty"));

        let mut registry = ModelRegistry::new();
        assert_matches!(
            registry.register_model(&store, handle),
            Err(SchemaError::MissingFieldMetadata { ref model }) if model == "Empty"
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn table_name_defaults_to_snake_case() {
        let mut store = MetadataStore::new();
        let handle = store.declare_model();
        store.attach_model_metadata(handle, ModelOptions::new("SalesOrder"));
        store.attach_field_metadata(handle, "id", FieldOptions::new());

        let mut registry = ModelRegistry::new();
        registry.register_model(&store, handle).unwrap();
        assert_eq!(registry.get_model("SalesOrder").unwrap().table_name, "sales_order");
    }

    #[test]
    fn table_name_override_wins() {
        let mut store = MetadataStore::new();
        let handle = store.declare_model();
        store.attach_model_metadata(
            handle,
            ModelOptions::new("Person").table_name("people"),
        );
        store.attach_field_metadata(handle, "id", FieldOptions::new());

        let mut registry = ModelRegistry::new();
        registry.register_model(&store, handle).unwrap();
        assert_eq!(registry.get_model("Person").unwrap().table_name, "people");
    }

    #[test]
    fn reregistration_replaces_prior_definition() {
        let (store, handle) = store_with_product();
        let mut registry = ModelRegistry::new();
        registry.register_model(&store, handle).unwrap();

        let mut store2 = MetadataStore::new();
        let handle2 = store2.declare_model();
        store2.attach_model_metadata(handle2, ModelOptions::new("Product"));
        store2.attach_field_metadata(handle2, "sku", FieldOptions::new().unique());
        registry.register_model(&store2, handle2).unwrap();

        assert_eq!(registry.len(), 1);
        let definition = registry.get_model("Product").unwrap();
        assert_eq!(definition.fields.len(), 1);
        assert_eq!(definition.fields[0].name, "sku");
    }

    #[test]
    fn reference_fields_derive_many_to_one_relations() {
        let mut store = MetadataStore::new();
        let handle = store.declare_model();
        store.attach_model_metadata(handle, ModelOptions::new("Order"));
        store.attach_field_metadata(handle, "id", FieldOptions::new().primary_key());
        store.attach_field_metadata(handle, "customer", FieldOptions::new().references("Customer"));

        let mut registry = ModelRegistry::new();
        registry.register_model(&store, handle).unwrap();

        let definition = registry.get_model("Order").unwrap();
        assert_eq!(definition.relations.len(), 1);
        let relation = &definition.relations[0];
        assert_eq!(relation.name, "customer");
        assert_eq!(relation.target_entity, "Customer");
        assert_eq!(relation.kind, RelationKind::ManyToOne);
        assert_eq!(relation.foreign_key, "customer");
    }

    #[test]
    fn relation_foreign_key_tracks_storage_column() {
        let mut store = MetadataStore::new();
        let handle = store.declare_model();
        store.attach_model_metadata(handle, ModelOptions::new("Invoice"));
        store.attach_field_metadata(
            handle,
            "billingAccount",
            FieldOptions::new().references("Account"),
        );

        let mut registry = ModelRegistry::new();
        registry.register_model(&store, handle).unwrap();

        let relation = &registry.get_model("Invoice").unwrap().relations[0];
        assert_eq!(relation.foreign_key, "billing_account");
    }

    #[test]
    fn get_model_absence_is_not_an_error() {
        let registry = ModelRegistry::new();
        assert!(registry.get_model("Nope").is_none());
    }

    #[test]
    fn clear_drops_all_registrations() {
        let (store, handle) = store_with_product();
        let mut registry = ModelRegistry::new();
        registry.register_model(&store, handle).unwrap();
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }
}
