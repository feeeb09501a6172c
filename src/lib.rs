//! crmforge: a schema-driven CRM backend generator with a local process
//! supervisor.
//!
//! Callers declare models through [`schema::MetadataStore`], register them
//! into a [`schema::ModelRegistry`], render a complete Go backend with
//! [`codegen::CodeGenerator`], and hand the output to
//! [`server::LocalServer`] to build, run, and supervise.

pub mod codegen;
pub mod config;
pub mod error;
pub mod logging;
pub mod naming;
pub mod schema;
pub mod server;

pub use codegen::{CodeGenerator, GeneratorConfig, go_type};
pub use config::{AppConfig, CliArgs, CommandKind, DatabaseConfig, ServerOptions};
pub use error::{CodegenError, SchemaError, ServerError};
pub use logging::{LogFormat, LoggingConfig, init_logging};
pub use naming::{to_camel_case, to_pascal_case, to_snake_case};
pub use schema::{
    EntityDefinition, FieldMetadata, FieldOptions, FieldType, MetadataStore, ModelHandle,
    ModelOptions, ModelRegistry, RelationDefinition, RelationKind, SchemaManifest,
};
pub use server::{LocalServer, READINESS_MARKERS, ServerPhase};
