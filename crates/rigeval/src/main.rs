use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rigeval_core::bundle::BundleMatcher;
use rigeval_core::config::{Config, CONFIG_FILE_NAME};
use rigeval_core::evaluate::{self, AnswerKey, AnswerSet};
use rigeval_core::pipeline::{self, ReportPipeline};
use rigeval_core::types::RunMode;
use rigeval_report::{json, markdown, text, FileRenderer};

#[derive(Parser)]
#[command(name = "rigeval")]
#[command(about = "Score build-graph complexity and measure how structured metadata changes agent answers")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable colored terminal output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScoreFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    With,
    Without,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over a comparison set and write charts and reports
    Report {
        /// Root directory holding the repository bundles (searched recursively)
        root: PathBuf,
        /// Output directory (defaults to <root>/analysis)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Config file path (defaults to .rigeval.toml in root or an ancestor)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Summary printed to stdout
        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormat,
        /// Exit with code 1 when any repository was rejected
        #[arg(long)]
        strict: bool,
    },
    /// Score ground-truth graphs and normalize them as one comparison set
    Score {
        /// Ground-truth JSON files
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "text")]
        format: ScoreFormat,
    },
    /// Evaluate one answer file against an answer key and print the result as JSON
    Evaluate {
        /// Answer file, e.g. claude_RIG_answers.json
        answers: PathBuf,
        /// Answer key (evaluation_questions.json)
        #[arg(short, long)]
        key: PathBuf,
        /// Run mode when the file name does not carry one
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Create a default .rigeval.toml configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let result = match cli.command {
        Commands::Report {
            root,
            out,
            config,
            format,
            strict,
        } => cmd_report(&root, out, config.as_deref(), format, strict),
        Commands::Score {
            paths,
            config,
            format,
        } => cmd_score(&paths, config.as_deref(), format),
        Commands::Evaluate { answers, key, mode } => cmd_evaluate(&answers, &key, mode),
        Commands::Init { force } => cmd_init(force),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(2);
    }
}

fn load_config(root: &Path, config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(p) => Config::load(p),
        None => Ok(Config::load_or_default(root)),
    }
}

fn cmd_report(
    root: &Path,
    out: Option<PathBuf>,
    config_path: Option<&Path>,
    format: ReportFormat,
    strict: bool,
) -> Result<()> {
    let config = load_config(root, config_path)?;
    let out_dir = out.unwrap_or_else(|| root.join("analysis"));
    tracing::debug!(root = %root.display(), out = %out_dir.display(), "report");

    let pipeline = ReportPipeline::new(config, Box::new(FileRenderer::new()));
    let outcome = pipeline.run(root, &out_dir)?;

    let passed = outcome.report.failures.is_empty();
    match format {
        ReportFormat::Text => {
            if strict {
                let (report, _) = text::format_strict(&outcome.report);
                print!("{report}");
            } else {
                print!("{}", text::format_report(&outcome.report));
            }
            for path in &outcome.written {
                println!("wrote {}", path.display());
            }
        }
        ReportFormat::Json => println!(
            "{}",
            json::format_report(&outcome.report, &outcome.charts, &outcome.meta, false)
        ),
        ReportFormat::Markdown => print!(
            "{}",
            markdown::format_report(&outcome.report, &outcome.charts, &outcome.meta)
        ),
    }

    if strict && !passed {
        process::exit(1);
    }
    Ok(())
}

fn repository_name(path: &Path, declared: Option<&str>) -> String {
    if let Some(name) = declared {
        return name.to_string();
    }
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn cmd_score(paths: &[PathBuf], config_path: Option<&Path>, format: ScoreFormat) -> Result<()> {
    let base = paths
        .first()
        .and_then(|p| p.parent())
        .unwrap_or_else(|| Path::new("."));
    let config = load_config(base, config_path)?;

    let mut graphs = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ground truth '{}'", path.display()))?;
        let declared = serde_json::from_str::<serde_json::Value>(&content)
            .ok()
            .and_then(|v| v.get("repository").and_then(|r| r.as_str()).map(str::to_string));
        graphs.push((repository_name(path, declared.as_deref()), content));
    }

    let scores = pipeline::score_set(&graphs, &config);
    match format {
        ScoreFormat::Text => print!("{}", text::format_scores(&scores)),
        ScoreFormat::Json => println!("{}", json::format_scores(&scores, false)),
    }
    Ok(())
}

fn cmd_evaluate(answers_path: &Path, key_path: &Path, mode: Option<ModeArg>) -> Result<()> {
    let config = Config::load_or_default(answers_path.parent().unwrap_or_else(|| Path::new(".")));
    let matcher = BundleMatcher::new(&config.bundle)?;

    let file_name = answers_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (agent, parsed_mode) = match matcher.parse_answer_name(&file_name) {
        Some((agent, mode)) => (agent, Some(mode)),
        None => (
            file_name
                .trim_end_matches(".json")
                .trim_end_matches("_answers")
                .to_string(),
            None,
        ),
    };
    let mode = match (mode, parsed_mode) {
        (Some(ModeArg::With), _) => RunMode::WithMetadata,
        (Some(ModeArg::Without), _) => RunMode::WithoutMetadata,
        (None, Some(mode)) => mode,
        (None, None) => anyhow::bail!(
            "cannot tell the run mode from '{file_name}'. Pass --mode with|without."
        ),
    };

    let repository = repository_name(answers_path, None);
    tracing::debug!(%repository, %agent, %mode, "evaluate");
    let key = AnswerKey::load(key_path)?;
    let answers = AnswerSet::load(answers_path, &repository, &agent, mode)?;
    let result = evaluate::evaluate(&answers, &key);
    println!("{}", json::format_evaluation(&result, false));
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let target = PathBuf::from(CONFIG_FILE_NAME);
    if target.exists() && !force {
        anyhow::bail!("{CONFIG_FILE_NAME} already exists. Use --force to overwrite.");
    }
    std::fs::write(&target, Config::default_toml())?;
    println!("Created {CONFIG_FILE_NAME} with default configuration.");
    Ok(())
}
