//! File-level assertions over the generation pipeline.

use crmforge::{
    CodeGenerator, FieldOptions, FieldType, GeneratorConfig, MetadataStore, ModelOptions,
    ModelRegistry,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn registry_with(models: &[&str]) -> ModelRegistry {
    let mut store = MetadataStore::new();
    let mut registry = ModelRegistry::new();
    for name in models {
        let handle = store.declare_model();
        store.attach_model_metadata(handle, ModelOptions::new(*name));
        store.attach_field_metadata(
            handle,
            "id",
            FieldOptions::new()
                .field_type(FieldType::Number)
                .primary_key()
                .auto_increment(),
        );
        store.attach_field_metadata(handle, "name", FieldOptions::new());
        registry.register_model(&store, handle).unwrap();
    }
    registry
}

fn count_files(dir: &Path) -> usize {
    let mut count = 0;
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                count += 1;
            }
        }
    }
    count
}

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path.as_ref())
        .unwrap_or_else(|e| panic!("failed to read {:?}: {e}", path.as_ref()))
}

// =============================================================================
// Generation Runs
// =============================================================================

#[tokio::test]
async fn empty_registry_writes_nothing() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let registry = ModelRegistry::new();
    let generator = CodeGenerator::new(GeneratorConfig::default()).unwrap();

    // Act
    generator.generate(&registry, dir.path()).await.unwrap();

    // Assert
    assert_eq!(count_files(dir.path()), 0);
    assert!(!dir.path().join("generated").exists());
}

#[tokio::test]
async fn three_models_produce_two_files_each_plus_aggregates() {
    let dir = TempDir::new().unwrap();
    let registry = registry_with(&["Customer", "Order", "Product"]);
    let generator = CodeGenerator::new(GeneratorConfig::default()).unwrap();

    generator.generate(&registry, dir.path()).await.unwrap();

    let out = dir.path().join("generated");
    for model in ["customer", "order", "product"] {
        assert!(out.join("models").join(format!("{model}.go")).is_file());
        assert!(
            out.join("controllers")
                .join(format!("{model}_controller.go"))
                .is_file()
        );
    }
    assert!(out.join("routes/custom_routes.go").is_file());
    assert!(out.join("main.go").is_file());
    assert!(out.join("go.mod").is_file());
    // 2 files per model, plus go.mod, routes, and main.
    assert_eq!(count_files(&out), 9);
}

#[tokio::test]
async fn model_file_carries_gorm_tags_and_table_name() {
    let dir = TempDir::new().unwrap();
    let mut store = MetadataStore::new();
    let mut registry = ModelRegistry::new();
    let handle = store.declare_model();
    store.attach_model_metadata(handle, ModelOptions::new("SalesOrder"));
    store.attach_field_metadata(
        handle,
        "id",
        FieldOptions::new()
            .field_type(FieldType::Number)
            .primary_key()
            .auto_increment(),
    );
    store.attach_field_metadata(
        handle,
        "shippedAt",
        FieldOptions::new().field_type(FieldType::Date).optional(),
    );
    store.attach_field_metadata(handle, "customer", FieldOptions::new().references("Customer"));
    registry.register_model(&store, handle).unwrap();
    let generator = CodeGenerator::new(GeneratorConfig::default()).unwrap();

    generator.generate(&registry, dir.path()).await.unwrap();

    let model = read(dir.path().join("generated/models/sales_order.go"));
    assert!(model.contains("type SalesOrder struct"));
    assert!(model.contains("return \"sales_order\""));
    assert!(model.contains("import \"time\""));
    assert!(model.contains("ShippedAt time.Time"));
    assert!(model.contains("Customer uint"));
    assert!(model.contains("gorm:\"column:id;primaryKey;autoIncrement\""));
    assert!(model.contains("json:\"shippedAt\""));
    assert!(model.contains("column:shipped_at"));
}

#[tokio::test]
async fn routes_file_wires_every_model() {
    let dir = TempDir::new().unwrap();
    let registry = registry_with(&["Customer", "Invoice"]);
    let generator = CodeGenerator::new(GeneratorConfig::default()).unwrap();

    generator.generate(&registry, dir.path()).await.unwrap();

    let routes = read(dir.path().join("generated/routes/custom_routes.go"));
    for pascal in ["Customer", "Invoice"] {
        assert!(routes.contains(&format!("controllers.New{pascal}Controller(db)")));
    }
    for snake in ["customer", "invoice"] {
        assert!(routes.contains(&format!("api.GET(\"/{snake}\"")));
        assert!(routes.contains(&format!("api.DELETE(\"/{snake}/:id\"")));
    }
}

#[tokio::test]
async fn entry_point_enumerates_all_models() {
    let dir = TempDir::new().unwrap();
    let registry = registry_with(&["Customer", "Order", "Product"]);
    let generator = CodeGenerator::new(GeneratorConfig::default()).unwrap();

    generator.generate(&registry, dir.path()).await.unwrap();

    let main_go = read(dir.path().join("generated/main.go"));
    for pascal in ["Customer", "Order", "Product"] {
        assert!(main_go.contains(&format!("&models.{pascal}{{}}")));
    }
    assert!(main_go.contains("Server started"));
}

#[tokio::test]
async fn manifest_carries_module_path_and_fixed_dependencies() {
    let dir = TempDir::new().unwrap();
    let registry = registry_with(&["Customer"]);
    let config = GeneratorConfig::default().module_path("example.com/acme/crm");
    let generator = CodeGenerator::new(config).unwrap();

    generator.generate(&registry, dir.path()).await.unwrap();

    let go_mod = read(dir.path().join("generated/go.mod"));
    assert!(go_mod.starts_with("module example.com/acme/crm"));
    for dependency in [
        "github.com/gin-gonic/gin",
        "gorm.io/gorm",
        "gorm.io/driver/mysql",
        "github.com/go-playground/validator",
        "github.com/golang-jwt/jwt",
        "github.com/sirupsen/logrus",
        "github.com/joho/godotenv",
        "golang.org/x/crypto",
    ] {
        assert!(go_mod.contains(dependency), "missing dependency {dependency}");
    }

    let controller = read(dir.path().join("generated/controllers/customer_controller.go"));
    assert!(controller.contains("\"example.com/acme/crm/models\""));
}

#[tokio::test]
async fn override_directory_replaces_builtin_template() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let template_dir = TempDir::new().unwrap();
    fs::write(
        template_dir.path().join("model.go.tera"),
        "// custom record for {{ entity.pascal }}\n",
    )
    .unwrap();
    let registry = registry_with(&["Customer"]);
    let config = GeneratorConfig::default().template_dir(template_dir.path());
    let generator = CodeGenerator::new(config).unwrap();

    // Act
    generator.generate(&registry, dir.path()).await.unwrap();

    // Assert
    let model = read(dir.path().join("generated/models/customer.go"));
    assert_eq!(model, "// custom record for Customer\n");
    // Untouched artifacts still come from the built-in defaults.
    let routes = read(dir.path().join("generated/routes/custom_routes.go"));
    assert!(routes.contains("RegisterCustomRoutes"));
}

#[tokio::test]
async fn broken_template_aborts_the_whole_run() {
    let dir = TempDir::new().unwrap();
    let template_dir = TempDir::new().unwrap();
    fs::write(
        template_dir.path().join("routes.go.tera"),
        "{{ not_a_context_value.attr }}",
    )
    .unwrap();
    let registry = registry_with(&["Customer", "Order"]);
    let config = GeneratorConfig::default().template_dir(template_dir.path());
    let generator = CodeGenerator::new(config).unwrap();

    let result = generator.generate(&registry, dir.path()).await;

    assert!(result.is_err());
    // The aggregate failure leaves the routes file unwritten.
    assert!(!dir.path().join("generated/routes/custom_routes.go").exists());
}

#[tokio::test]
async fn generation_is_deterministic_for_a_fixed_registry() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let registry = registry_with(&["Customer", "Order"]);
    let generator = CodeGenerator::new(GeneratorConfig::default()).unwrap();

    generator.generate(&registry, first_dir.path()).await.unwrap();
    generator.generate(&registry, second_dir.path()).await.unwrap();

    // Everything except the embedded timestamp matches between runs.
    for artifact in [
        "generated/go.mod",
        "generated/routes/custom_routes.go",
    ] {
        let first = read(first_dir.path().join(artifact));
        let second = read(second_dir.path().join(artifact));
        let strip = |text: &str| {
            text.lines()
                .filter(|line| !line.contains("Generated at") && !line.contains("generated by"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert_eq!(strip(&first), strip(&second), "artifact {artifact} differs");
    }
}
