use crate::codegen::GeneratorConfig;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_DB_HOST: &str = "127.0.0.1";
const DEFAULT_DB_PORT: u16 = 3306;
const DEFAULT_DB_USER: &str = "root";
const DEFAULT_DB_NAME: &str = "crm";
const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_JWT_EXPIRATION_HOURS: u32 = 24;
const DEFAULT_ALLOWED_ORIGINS: &str = "*";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_TOOLCHAIN: &str = "go";

/// Connection settings for the generated backend's database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            name: DEFAULT_DB_NAME.to_string(),
        }
    }
}

/// Runtime settings for the supervised backend process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerOptions {
    /// TCP port the backend listens on.
    pub port: u16,
    /// JWT signing secret; a random one is generated when absent.
    pub jwt_secret: Option<String>,
    pub jwt_expiration_hours: u32,
    pub allowed_origins: String,
    pub log_level: String,
    /// Mirrors the backend's UI_TEST_MODE flag (auth disabled).
    pub disable_auth: bool,
    /// Mirrors the backend's SEED_TEST_DATA flag.
    pub seed_test_data: bool,
    /// Toolchain program invoked for the version check, dependency
    /// install, and process spawn.
    pub toolchain: String,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERVER_PORT,
            jwt_secret: None,
            jwt_expiration_hours: DEFAULT_JWT_EXPIRATION_HOURS,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            disable_auth: false,
            seed_test_data: false,
            toolchain: DEFAULT_TOOLCHAIN.to_string(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "crmforge", about = "Schema-driven CRM backend generator", version)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CommandKind,
}

#[derive(Subcommand, Debug)]
pub enum CommandKind {
    /// Generate the backend source tree and exit
    Generate(GenerateArgs),
    /// Generate the backend, then build, run, and supervise it
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct GenerateArgs {
    #[arg(
        long,
        env = "CRMFORGE_SCHEMA",
        value_name = "FILE",
        help = "Schema manifest describing the models to generate"
    )]
    pub schema: PathBuf,

    #[arg(
        long,
        env = "CRMFORGE_OUT",
        value_name = "DIR",
        default_value = "./backend",
        help = "Base directory receiving the generated source tree"
    )]
    pub out: PathBuf,

    #[arg(
        long,
        env = "CRMFORGE_MODULE_PATH",
        value_name = "PATH",
        help = "Go module path written into go.mod"
    )]
    pub module_path: Option<String>,

    #[arg(
        long,
        env = "CRMFORGE_TEMPLATES",
        value_name = "DIR",
        help = "Directory of .tera templates overriding the built-in defaults"
    )]
    pub templates: Option<PathBuf>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub generate: GenerateArgs,

    #[arg(long, env = "CRMFORGE_DB_HOST", value_name = "HOST")]
    pub db_host: Option<String>,

    #[arg(long, env = "CRMFORGE_DB_PORT", value_name = "PORT")]
    pub db_port: Option<u16>,

    #[arg(long, env = "CRMFORGE_DB_USER", value_name = "USER")]
    pub db_user: Option<String>,

    #[arg(long, env = "CRMFORGE_DB_PASSWORD", value_name = "PASSWORD")]
    pub db_password: Option<String>,

    #[arg(long, env = "CRMFORGE_DB_NAME", value_name = "NAME")]
    pub db_name: Option<String>,

    #[arg(long, env = "CRMFORGE_PORT", value_name = "PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "CRMFORGE_JWT_SECRET", value_name = "SECRET")]
    pub jwt_secret: Option<String>,

    #[arg(long, env = "CRMFORGE_JWT_EXPIRATION_HOURS", value_name = "HOURS")]
    pub jwt_expiration_hours: Option<u32>,

    #[arg(long, env = "CRMFORGE_ALLOWED_ORIGINS", value_name = "ORIGINS")]
    pub allowed_origins: Option<String>,

    #[arg(long, env = "CRMFORGE_LOG_LEVEL", value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[arg(long, help = "Run the backend with authentication disabled")]
    pub disable_auth: bool,

    #[arg(long, help = "Seed the backend with test data on startup")]
    pub seed_test_data: bool,

    #[arg(
        long,
        env = "CRMFORGE_TOOLCHAIN",
        value_name = "PROGRAM",
        help = "Backend toolchain program (defaults to go)"
    )]
    pub toolchain: Option<String>,
}

/// Fully resolved configuration for one generate or serve run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub schema: PathBuf,
    pub out_dir: PathBuf,
    pub generator: GeneratorConfig,
    pub database: DatabaseConfig,
    pub server: ServerOptions,
}

impl AppConfig {
    /// Resolve a `generate` invocation. Database and server settings keep
    /// their defaults; only the generator surface is consulted.
    pub fn from_generate(config_file: Option<&Path>, args: GenerateArgs) -> Result<Self> {
        let file = load_config_file_opt(config_file)?;
        Self::resolve(args, ServeArgs::default(), file)
    }

    /// Resolve a `serve` invocation: CLI flags win over config-file values,
    /// which win over the built-in defaults.
    pub fn from_serve(config_file: Option<&Path>, args: ServeArgs) -> Result<Self> {
        let file = load_config_file_opt(config_file)?;
        Self::resolve(args.generate.clone(), args, file)
    }

    fn resolve(generate: GenerateArgs, serve: ServeArgs, file: PartialConfig) -> Result<Self> {
        anyhow::ensure!(
            !generate.schema.as_os_str().is_empty(),
            "a schema manifest path is required"
        );

        let mut generator = GeneratorConfig::default();
        if let Some(module_path) = generate.module_path.or(file.module_path) {
            generator = generator.module_path(module_path);
        }
        if let Some(templates) = generate.templates.or(file.templates) {
            generator = generator.template_dir(templates);
        }

        let defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            host: serve.db_host.or(file.db_host).unwrap_or(defaults.host),
            port: serve.db_port.or(file.db_port).unwrap_or(defaults.port),
            user: serve.db_user.or(file.db_user).unwrap_or(defaults.user),
            password: serve
                .db_password
                .or(file.db_password)
                .unwrap_or(defaults.password),
            name: serve.db_name.or(file.db_name).unwrap_or(defaults.name),
        };

        let server_defaults = ServerOptions::default();
        let server = ServerOptions {
            port: serve.port.or(file.port).unwrap_or(server_defaults.port),
            jwt_secret: serve.jwt_secret.or(file.jwt_secret),
            jwt_expiration_hours: serve
                .jwt_expiration_hours
                .or(file.jwt_expiration_hours)
                .unwrap_or(server_defaults.jwt_expiration_hours),
            allowed_origins: serve
                .allowed_origins
                .or(file.allowed_origins)
                .unwrap_or(server_defaults.allowed_origins),
            log_level: serve
                .log_level
                .or(file.log_level)
                .unwrap_or(server_defaults.log_level),
            disable_auth: serve.disable_auth || file.disable_auth.unwrap_or(false),
            seed_test_data: serve.seed_test_data || file.seed_test_data.unwrap_or(false),
            toolchain: serve
                .toolchain
                .or(file.toolchain)
                .unwrap_or(server_defaults.toolchain),
        };

        Ok(Self {
            schema: generate.schema,
            out_dir: generate.out,
            generator,
            database,
            server,
        })
    }

    pub fn ensure_schema_exists(&self) -> Result<()> {
        anyhow::ensure!(
            self.schema.exists(),
            "schema manifest {:?} does not exist",
            self.schema
        );
        anyhow::ensure!(
            self.schema.is_file(),
            "schema manifest {:?} is not a file",
            self.schema
        );
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    module_path: Option<String>,
    templates: Option<PathBuf>,
    db_host: Option<String>,
    db_port: Option<u16>,
    db_user: Option<String>,
    db_password: Option<String>,
    db_name: Option<String>,
    port: Option<u16>,
    jwt_secret: Option<String>,
    jwt_expiration_hours: Option<u32>,
    allowed_origins: Option<String>,
    log_level: Option<String>,
    disable_auth: Option<bool>,
    seed_test_data: Option<bool>,
    toolchain: Option<String>,
}

fn load_config_file_opt(path: Option<&Path>) -> Result<PartialConfig> {
    match path {
        Some(path) => load_config_file(path),
        None => Ok(PartialConfig::default()),
    }
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
