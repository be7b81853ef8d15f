//! spark-preprocessor CLI - compile feature pipelines to SQLMesh projects
//!
//! Usage:
//!   spark-preprocessor compile --pipeline <pipeline.yaml> --out <dir>
//!   spark-preprocessor render-sql --pipeline <pipeline.yaml> --out <dir>
//!   spark-preprocessor test --pipeline <pipeline.yaml> --project <dir>
//!   spark-preprocessor scaffold --mapping <mapping.yaml> --out <dir>
//!   spark-preprocessor features

use clap::{Parser, Subcommand, ValueEnum};
use spark_preprocessor::compile::{compile_pipeline, CompileOptions};
use spark_preprocessor::config::Settings;
use spark_preprocessor::features::FeatureRegistry;
use spark_preprocessor::logging::{init_logging, LogConfig, LogFormat};
use spark_preprocessor::scaffold::scaffold_pipeline;
use spark_preprocessor::schema::load_pipeline_document;
use spark_preprocessor::sql::validate_sql;
use spark_preprocessor::Result;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "spark-preprocessor")]
#[command(about = "Compile declarative feature pipelines into SQLMesh models")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, default_value = "pretty", global = true)]
    log_format: LogFormatArg,

    /// Path to a spark-preprocessor.toml settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a pipeline into a SQLMesh project
    Compile {
        #[arg(long)]
        pipeline: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },

    /// Compile a pipeline and print the rendered statement
    #[command(name = "render-sql")]
    RenderSql {
        #[arg(long)]
        pipeline: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },

    /// Compile a pipeline and check that the rendered statement parses
    Test {
        #[arg(long)]
        pipeline: PathBuf,

        #[arg(long)]
        project: PathBuf,
    },

    /// Write a starter pipeline.yaml for a mapping file
    Scaffold {
        #[arg(long)]
        mapping: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },

    /// List registered features
    Features,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format.into());
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli.command, cli.config.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, kind = ?e.kind(), "command_failed");
            ExitCode::FAILURE
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };
    Ok(settings)
}

fn run(command: Commands, config: Option<&Path>) -> Result<()> {
    match command {
        Commands::Compile { pipeline, out } => cmd_compile(&pipeline, &out, config),
        Commands::RenderSql { pipeline, out } => cmd_render(&pipeline, &out, config),
        Commands::Test { pipeline, project } => cmd_test(&pipeline, &project, config),
        Commands::Scaffold { mapping, out } => {
            let path = scaffold_pipeline(&mapping, &out)?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Features => cmd_features(),
    }
}

fn cmd_compile(pipeline: &Path, out: &Path, config: Option<&Path>) -> Result<()> {
    let registry = FeatureRegistry::with_builtins()?;
    let options = CompileOptions::default().with_settings(load_settings(config)?);
    let output = compile_pipeline(pipeline, out, &registry, &options)?;
    for (key, reason) in output.report.skipped_features() {
        println!("skipped {key}: {reason}");
    }
    Ok(())
}

fn cmd_render(pipeline: &Path, out: &Path, config: Option<&Path>) -> Result<()> {
    let registry = FeatureRegistry::with_builtins()?;
    let options = CompileOptions::default().with_settings(load_settings(config)?);
    let output = compile_pipeline(pipeline, out, &registry, &options)?;
    info!(
        pipeline = %output.report.pipeline_name(),
        sql_path = %out
            .join(spark_preprocessor::compile::rendered_path(output.report.pipeline_name()))
            .display(),
        "render_complete"
    );
    println!("{}", output.rendered_sql);
    Ok(())
}

fn cmd_test(pipeline: &Path, project: &Path, config: Option<&Path>) -> Result<()> {
    let registry = FeatureRegistry::with_builtins()?;
    let options = CompileOptions::default().with_settings(load_settings(config)?);
    let document = load_pipeline_document(pipeline)?;
    let output = compile_pipeline(pipeline, project, &registry, &options)?;
    validate_sql(&output.rendered_sql, document.pipeline.execution_target)?;
    info!(pipeline = %output.report.pipeline_name(), "test_complete");
    println!("OK: rendered SQL for {} parses", output.report.pipeline_name());
    Ok(())
}

fn cmd_features() -> Result<()> {
    let registry = FeatureRegistry::with_builtins()?;
    for feature in registry.iter() {
        let metadata = feature.metadata();
        match &metadata.description {
            Some(description) => println!("{}  {description}", metadata.key),
            None => println!("{}", metadata.key),
        }
    }
    Ok(())
}
