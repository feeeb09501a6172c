use anyhow::{Context, Result};
use clap::Parser;
use crmforge::{
    AppConfig, CliArgs, CodeGenerator, CommandKind, LocalServer, LoggingConfig, MetadataStore,
    ModelRegistry, SchemaManifest, init_logging,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LoggingConfig::from_env());

    let cli = CliArgs::parse();
    match cli.command {
        CommandKind::Generate(args) => {
            let config = AppConfig::from_generate(cli.config.as_deref(), args)?;
            let registry = load_registry(&config)?;
            let generator = CodeGenerator::new(config.generator.clone())?;
            generator
                .generate(&registry, &config.out_dir)
                .await
                .context("code generation failed")?;
            Ok(())
        }
        CommandKind::Serve(args) => {
            let config = AppConfig::from_serve(cli.config.as_deref(), args)?;
            let registry = Arc::new(load_registry(&config)?);
            let generator = CodeGenerator::new(config.generator.clone())?;
            let mut server = LocalServer::new(
                registry,
                generator,
                config.database.clone(),
                config.server.clone(),
                config.out_dir.clone(),
            );

            server.start().await.context("backend startup failed")?;

            wait_for_shutdown_signal().await?;
            server.stop().await;
            Ok(())
        }
    }
}

async fn wait_for_shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .context("failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            tracing::info!("received SIGINT, stopping backend");
            result
        }
        result = terminate => {
            tracing::info!("received SIGTERM, stopping backend");
            result
        }
    }
}

fn load_registry(config: &AppConfig) -> Result<ModelRegistry> {
    config.ensure_schema_exists()?;
    let manifest = SchemaManifest::load(&config.schema)?;
    let mut store = MetadataStore::new();
    let mut registry = ModelRegistry::new();
    manifest.apply(&mut store, &mut registry)?;
    Ok(registry)
}
