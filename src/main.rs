use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use skos2xml::{
    config::{CollisionPolicy, ConverterConfig, DEFAULT_TEMPLATE_FILE},
    core::{ConversionReport, Converter, FileStatus},
    error::ConversionError,
    handlers::SourceResolver,
    templates::{output_filename, VocabularyTemplate, BUILTIN_TEMPLATE},
    utils::ReportSerializer,
};

#[derive(Parser)]
#[command(
    name = "skos2xml",
    about = "Convert SKOS thesauri into D-NET vocabulary XML files",
    long_about = None,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a SKOS file, or every matching file in a directory
    Convert {
        /// Input file or directory
        source: PathBuf,

        /// Namespace prefix for vocabulary and term codes
        #[arg(short, long)]
        namespace: Option<String>,

        /// Vocabulary template (defaults to template.xml next to the executable)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Directory the vocabulary files are written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Configuration file path (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Preferred label language
        #[arg(short, long)]
        language: Option<String>,

        /// What to do when two vocabularies map to the same file name
        #[arg(long, value_enum)]
        on_collision: Option<CollisionArg>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Render everything but write no files
        #[arg(long)]
        dry_run: bool,

        /// Write a conversion report (.json for JSON, YAML otherwise)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Suppress progress output
        #[arg(long)]
        non_verbose: bool,
    },

    /// List the vocabularies found in SOURCE without writing anything
    Inspect {
        /// Input file or directory
        source: PathBuf,

        /// Configuration file path (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Preferred label language
        #[arg(short, long)]
        language: Option<String>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Check that a template carries every required marker exactly once
    ValidateTemplate {
        /// Template file path
        path: PathBuf,
    },

    /// Write the bundled vocabulary template
    GenerateTemplate {
        /// Output path for the template
        #[arg(short, long, default_value = DEFAULT_TEMPLATE_FILE)]
        output: PathBuf,
    },

    /// Generate example configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long)]
        output: PathBuf,

        /// Configuration format (yaml or json)
        #[arg(short, long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum CollisionArg {
    Skip,
    Suffix,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(arg: CollisionArg) -> Self {
        match arg {
            CollisionArg::Skip => Self::Skip,
            CollisionArg::Suffix => Self::Suffix,
        }
    }
}

#[derive(clap::ValueEnum, Clone)]
enum ConfigFormat {
    Yaml,
    Json,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let quiet = matches!(cli.command, Commands::Convert { non_verbose: true, .. });
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else if quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Convert {
            source,
            namespace,
            template,
            output_dir,
            config,
            language,
            on_collision,
            recursive,
            dry_run,
            report,
            non_verbose,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(namespace) = namespace {
                config.namespace = namespace;
            }
            if let Some(template) = template {
                config.template = Some(template);
            }
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            if let Some(language) = language {
                config.language = language;
            }
            if let Some(policy) = on_collision {
                config.collision_policy = policy.into();
            }
            config.recursive |= recursive;
            config.dry_run |= dry_run;

            convert_command(config, source, report, non_verbose)
        }
        Commands::Inspect {
            source,
            config,
            language,
            recursive,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(language) = language {
                config.language = language;
            }
            config.recursive |= recursive;

            inspect_command(config, source)
        }
        Commands::ValidateTemplate { path } => validate_template_command(path),
        Commands::GenerateTemplate { output } => generate_template_command(output),
        Commands::GenerateConfig { output, format } => generate_config_command(output, format),
    }
}

fn load_config(path: Option<&Path>) -> Result<ConverterConfig> {
    match path {
        Some(path) => {
            let config = ConverterConfig::from_file(path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => Ok(ConverterConfig::default()),
    }
}

/// Explicit template, else `template.xml` beside the executable, else the
/// bundled one.
fn resolve_template(config: &ConverterConfig) -> Result<VocabularyTemplate> {
    if let Some(path) = &config.template {
        return Ok(VocabularyTemplate::from_file(path)?);
    }

    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_TEMPLATE_FILE)));

    match beside_exe {
        Some(path) if path.is_file() => Ok(VocabularyTemplate::from_file(&path)?),
        _ => {
            warn!("No {} found next to the executable, using the bundled template", DEFAULT_TEMPLATE_FILE);
            Ok(VocabularyTemplate::builtin()?)
        }
    }
}

fn convert_command(
    config: ConverterConfig,
    source: PathBuf,
    report_path: Option<PathBuf>,
    non_verbose: bool,
) -> Result<ExitCode> {
    if !non_verbose {
        println!("{}", " Starting SKOS conversion...".bright_blue().bold());
    }

    let template = resolve_template(&config)?;
    let mut converter = Converter::new(config, template)?;

    let files = match SourceResolver::from_config(converter.config()).resolve(&source) {
        Ok(files) => files,
        Err(e @ ConversionError::EmptyInput(_)) => {
            println!(" {}", e.to_string().yellow());
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => return Err(e.into()),
    };

    if !non_verbose {
        println!(" Source: {}", source.display().to_string().bright_green());
        println!(" Files to convert: {}", files.len().to_string().bright_cyan());
        println!(" Namespace: {}", converter.config().namespace);
        println!(" Output directory: {}", converter.config().output_dir.display());
        if converter.config().dry_run {
            println!(" {}", "Dry run: no files will be written".yellow());
        }
    }

    let progress = if non_verbose {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")
                .context("Invalid progress bar template")?
                .progress_chars("=> "),
        );
        bar
    };

    let report = converter.convert_files(&files, |outcome| {
        if let Some(name) = outcome.source.file_name() {
            progress.set_message(name.to_string_lossy().into_owned());
        }
        progress.inc(1);
    });
    progress.finish_and_clear();

    if let Some(path) = &report_path {
        ReportSerializer::new().write_to_file(&report, path)?;
        info!("Report written to {}", path.display());
    }

    if !non_verbose {
        print_summary(&report);
    }

    if report.has_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_summary(report: &ConversionReport) {
    println!("\n{}", " Conversion summary".bright_blue().bold());
    for outcome in &report.files {
        let source = outcome.source.display().to_string();
        match &outcome.status {
            FileStatus::Converted { vocabularies } => {
                println!("  {} {}", "OK".bright_green(), source);
                for vocabulary in vocabularies {
                    println!(
                        "     {} ({} terms) -> {}",
                        vocabulary.name.bright_cyan(),
                        vocabulary.terms,
                        vocabulary.output.display()
                    );
                }
            }
            FileStatus::Failed { error } => {
                println!("  {} {}: {}", "FAILED".bright_red(), source, error);
            }
        }
        for collision in &outcome.collisions {
            println!("     {} {}", "SKIPPED".yellow(), collision);
        }
    }

    println!(
        " Files converted: {}, failed: {}, vocabularies written: {}",
        report.converted().to_string().bright_green(),
        report.failed().to_string().bright_red(),
        report.vocabularies_written().to_string().bright_cyan()
    );
}

fn inspect_command(config: ConverterConfig, source: PathBuf) -> Result<ExitCode> {
    println!("{}", " Inspecting SKOS sources...".bright_blue().bold());

    let converter = Converter::new(config, VocabularyTemplate::builtin()?)?;
    let files = match SourceResolver::from_config(converter.config()).resolve(&source) {
        Ok(files) => files,
        Err(e @ ConversionError::EmptyInput(_)) => {
            println!(" {}", e.to_string().yellow());
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => return Err(e.into()),
    };

    let mut failed = false;
    for path in &files {
        println!("\n {}", path.display().to_string().bright_green());
        match converter.extract_file(path) {
            Ok(vocabularies) => {
                if vocabularies.is_empty() {
                    println!("   {}", "no concepts".yellow());
                }
                for vocabulary in &vocabularies {
                    let kind = if vocabulary.is_unclassified() { "unclassified" } else { "top concept" };
                    println!(
                        "   {} [{}] {} terms -> {}",
                        vocabulary.name.bright_cyan(),
                        kind,
                        vocabulary.len(),
                        output_filename(&vocabulary.name)
                    );
                }
            }
            Err(e) => {
                error!("{}", e);
                failed = true;
            }
        }
    }

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn validate_template_command(path: PathBuf) -> Result<ExitCode> {
    println!("{}", " Validating template...".bright_blue().bold());

    match VocabularyTemplate::from_file(&path) {
        Ok(template) => {
            println!(" Template is valid!");
            let markers: Vec<&str> = template.placeholders().iter().map(|p| p.marker()).collect();
            println!(" Markers: {}", markers.join(", ").bright_green());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(" Template validation failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn generate_template_command(output_path: PathBuf) -> Result<ExitCode> {
    println!("{}", " Writing bundled template...".bright_blue().bold());

    fs::write(&output_path, BUILTIN_TEMPLATE)
        .with_context(|| format!("Failed to write template: {}", output_path.display()))?;

    println!(" Template written to: {}", output_path.display().to_string().bright_green());
    Ok(ExitCode::SUCCESS)
}

fn generate_config_command(output_path: PathBuf, format: ConfigFormat) -> Result<ExitCode> {
    println!("{}", " Generating example configuration...".bright_blue().bold());

    let config = ConverterConfig::example();

    let content = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(&config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
    };

    fs::write(&output_path, content)
        .with_context(|| format!("Failed to write configuration: {}", output_path.display()))?;

    println!(" Example configuration generated at: {}", output_path.display().to_string().bright_green());
    println!(" Edit the file to customize for your use case");

    Ok(ExitCode::SUCCESS)
}
