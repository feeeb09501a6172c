//! Backend source tree generation.
//!
//! Renders the registry through a Tera template pipeline into a complete
//! Go backend: one record file and one request-handler file per model,
//! aggregate route wiring, an entry point, and the `go.mod` manifest.
//! Built-in templates are compiled into the binary; a template directory
//! can override any of them.
//!
//! Generation is all-or-nothing. The first template or filesystem failure
//! aborts the run and propagates, and the output directory is then
//! untrustworthy until a later run succeeds.

pub mod types;

use crate::error::CodegenError;
use crate::naming::{to_camel_case, to_pascal_case, to_snake_case};
use crate::schema::{EntityDefinition, ModelRegistry, RelationDefinition};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::{debug, info, warn};

pub use types::go_type;

const MANIFEST_TEMPLATE: &str = "go.mod.tera";
const MODEL_TEMPLATE: &str = "model.go.tera";
const CONTROLLER_TEMPLATE: &str = "controller.go.tera";
const ROUTES_TEMPLATE: &str = "routes.go.tera";
const MAIN_TEMPLATE: &str = "main.go.tera";

const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    (MANIFEST_TEMPLATE, include_str!("../../templates/go.mod.tera")),
    (MODEL_TEMPLATE, include_str!("../../templates/model.go.tera")),
    (
        CONTROLLER_TEMPLATE,
        include_str!("../../templates/controller.go.tera"),
    ),
    (ROUTES_TEMPLATE, include_str!("../../templates/routes.go.tera")),
    (MAIN_TEMPLATE, include_str!("../../templates/main.go.tera")),
];

/// Generator configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Go module path written into `go.mod` and used for intra-module
    /// imports in the generated source.
    pub module_path: String,
    /// Directory of `.tera` templates overriding the built-in defaults.
    pub template_dir: Option<PathBuf>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            module_path: "crmforge-backend".to_string(),
            template_dir: None,
        }
    }
}

impl GeneratorConfig {
    pub fn module_path(mut self, module_path: impl Into<String>) -> Self {
        self.module_path = module_path.into();
        self
    }

    pub fn template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }
}

/// Per-field rendering context: the normalized metadata plus the mapped
/// Go type and every naming convention, so templates never re-derive them.
#[derive(Debug, Serialize)]
struct FieldContext {
    name: String,
    column: String,
    go_type: String,
    snake: String,
    camel: String,
    pascal: String,
    required: bool,
    unique: bool,
    primary_key: bool,
    auto_increment: bool,
    enum_values: Option<Vec<String>>,
    default_value: Option<JsonValue>,
    reference_target: Option<String>,
}

#[derive(Debug, Serialize)]
struct EntityContext {
    name: String,
    table_name: String,
    description: Option<String>,
    snake: String,
    camel: String,
    pascal: String,
    uses_time: bool,
    fields: Vec<FieldContext>,
    relations: Vec<RelationDefinition>,
}

impl EntityContext {
    fn from_definition(definition: &EntityDefinition) -> Self {
        let fields: Vec<FieldContext> = definition
            .fields
            .iter()
            .map(|field| FieldContext {
                name: field.name.clone(),
                column: field.storage_column.clone(),
                go_type: go_type(&field.field_type),
                snake: to_snake_case(&field.name),
                camel: to_camel_case(&field.name),
                pascal: to_pascal_case(&field.name),
                required: field.required,
                unique: field.unique,
                primary_key: field.primary_key,
                auto_increment: field.auto_increment,
                enum_values: field.enum_values.clone(),
                default_value: field.default_value.clone(),
                reference_target: field.reference_target.clone(),
            })
            .collect();
        let uses_time = fields.iter().any(|field| field.go_type.contains("time.Time"));
        Self {
            name: definition.name.clone(),
            table_name: definition.table_name.clone(),
            description: definition.description.clone(),
            snake: to_snake_case(&definition.name),
            camel: to_camel_case(&definition.name),
            pascal: to_pascal_case(&definition.name),
            uses_time,
            fields,
            relations: definition.relations.clone(),
        }
    }
}

/// Renders the registered models into a backend source tree.
pub struct CodeGenerator {
    tera: Tera,
    config: GeneratorConfig,
}

impl CodeGenerator {
    /// Build a generator, loading the override directory when configured
    /// and falling back to the built-in templates for anything it does not
    /// provide. A broken override directory is a generation error.
    pub fn new(config: GeneratorConfig) -> Result<Self, CodegenError> {
        let mut tera = match config.template_dir.as_ref() {
            Some(dir) => {
                let pattern = format!("{}/**/*.tera", dir.display());
                Tera::new(&pattern).map_err(|source| CodegenError::TemplateDir {
                    dir: dir.clone(),
                    source,
                })?
            }
            None => Tera::default(),
        };

        for &(name, content) in DEFAULT_TEMPLATES {
            if !tera.get_template_names().any(|existing| existing == name) {
                tera.add_raw_template(name, content)
                    .map_err(|source| CodegenError::TemplateCompile { name, source })?;
            }
        }

        Ok(Self { tera, config })
    }

    /// Render the full source tree under `<base_path>/generated`.
    ///
    /// An empty registry is not an error: the run logs a warning and
    /// returns without touching the filesystem. Per-model files carry no
    /// ordering requirement among themselves; the aggregate routes and
    /// entry-point files render over the finalized model list.
    pub async fn generate(
        &self,
        registry: &ModelRegistry,
        base_path: &Path,
    ) -> Result<(), CodegenError> {
        if registry.is_empty() {
            warn!("model registry is empty, skipping code generation");
            return Ok(());
        }

        let out_dir = base_path.join("generated");
        for sub in ["models", "controllers", "routes"] {
            let dir = out_dir.join(sub);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| CodegenError::CreateDir { path: dir, source })?;
        }

        let generated_at = chrono::Utc::now().to_rfc3339();
        let entities: Vec<EntityContext> = registry
            .all_models()
            .map(EntityContext::from_definition)
            .collect();

        let mut manifest_ctx = Context::new();
        manifest_ctx.insert("module_path", &self.config.module_path);
        self.render_to_file(MANIFEST_TEMPLATE, &manifest_ctx, &out_dir.join("go.mod"))
            .await?;

        for entity in &entities {
            let mut ctx = Context::new();
            ctx.insert("module_path", &self.config.module_path);
            ctx.insert("generated_at", &generated_at);
            ctx.insert("entity", entity);

            self.render_to_file(
                MODEL_TEMPLATE,
                &ctx,
                &out_dir.join("models").join(format!("{}.go", entity.snake)),
            )
            .await?;
            self.render_to_file(
                CONTROLLER_TEMPLATE,
                &ctx,
                &out_dir
                    .join("controllers")
                    .join(format!("{}_controller.go", entity.snake)),
            )
            .await?;
        }

        let mut aggregate_ctx = Context::new();
        aggregate_ctx.insert("module_path", &self.config.module_path);
        aggregate_ctx.insert("generated_at", &generated_at);
        aggregate_ctx.insert("entities", &entities);

        self.render_to_file(
            ROUTES_TEMPLATE,
            &aggregate_ctx,
            &out_dir.join("routes").join("custom_routes.go"),
        )
        .await?;
        self.render_to_file(MAIN_TEMPLATE, &aggregate_ctx, &out_dir.join("main.go"))
            .await?;

        info!(
            models = entities.len(),
            out_dir = %out_dir.display(),
            "code generation complete"
        );
        Ok(())
    }

    async fn render_to_file(
        &self,
        template: &str,
        ctx: &Context,
        path: &Path,
    ) -> Result<(), CodegenError> {
        let rendered = self
            .tera
            .render(template, ctx)
            .map_err(|source| CodegenError::Render {
                name: template.to_string(),
                source,
            })?;
        tokio::fs::write(path, rendered)
            .await
            .map_err(|source| CodegenError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(template, path = %path.display(), "rendered artifact");
        Ok(())
    }
}
