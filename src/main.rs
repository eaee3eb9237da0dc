use anyhow::{Context, Result};
use clap::Parser;
use release_pilot::analyzer::FileChange;
use release_pilot::config::{self, ReleaseConfig};
use release_pilot::pipeline::{ReleasePipeline, RunOptions};
use release_pilot::report::{self, OutputFormat};
use release_pilot::scm::{Git2Reader, SourceControl};
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(clap::Parser)]
#[command(
    name = "release-pilot",
    about = "Automated version release and deployment tool"
)]
struct Args {
    #[arg(short, long, help = "Project name")]
    project: String,

    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(long, help = "Current version tag (auto-detected if not provided)")]
    tag: Option<String>,

    #[arg(long, help = "Preview the version decision without making changes")]
    dry_run: bool,

    #[arg(long, help = "Skip test execution")]
    skip_tests: bool,

    #[arg(long, help = "Skip deployment")]
    skip_deploy: bool,

    #[arg(long, value_enum, default_value = "text", help = "Output format")]
    output: OutputFormat,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config::default_config_path(Path::new(".")));
    let config =
        ReleaseConfig::load(&config_path).context("failed to load release configuration")?;

    let mut pipeline = ReleasePipeline::new(config, &args.project)
        .context("failed to create release pipeline")?;
    let logger = pipeline.logger();

    let scm = Git2Reader::open(".").context("not inside a git repository")?;

    // Resolve the reference point: explicit tag, else latest reachable tag,
    // else the zero version
    let current_version = match &args.tag {
        Some(tag) => tag.clone(),
        None => match scm.latest_tag()? {
            Some(tag) => tag,
            None => {
                logger.info("No existing tags found, starting from v0.0.0", None);
                "v0.0.0".to_string()
            }
        },
    };
    let since = if current_version == "v0.0.0" {
        None
    } else {
        Some(current_version.as_str())
    };

    let commits: Vec<String> = match scm.commits_since(since) {
        Ok(records) => records.into_iter().map(|c| c.message).collect(),
        Err(e) => {
            logger.warn(
                "Failed to read commits, using empty list",
                Some(json!({ "error": e.to_string() })),
            );
            Vec::new()
        }
    };
    let file_changes: Vec<FileChange> = match scm.diff_since(since) {
        Ok(diff) => diff.files,
        Err(e) => {
            logger.warn(
                "Failed to read diff, using empty list",
                Some(json!({ "error": e.to_string() })),
            );
            Vec::new()
        }
    };

    if args.dry_run {
        let decision = pipeline.preview(&commits, &file_changes, &current_version)?;
        let analysis = release_pilot::analyzer::ChangeAnalyzer::new()
            .analyze_changes(&commits, &file_changes);
        match args.output {
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "dry_run": true,
                    "decision": decision,
                    "analysis": analysis,
                    "commits": commits,
                }))?
            ),
            OutputFormat::Text => {
                print!("{}", report::render_preview(&decision, &analysis, &commits))
            }
        }
        return Ok(());
    }

    let result = pipeline.execute(
        &commits,
        &file_changes,
        &current_version,
        RunOptions {
            skip_tests: args.skip_tests,
            skip_deploy: args.skip_deploy,
        },
    );

    match args.output {
        OutputFormat::Json => println!("{}", report::render_json(&result)?),
        OutputFormat::Text => print!("{}", report::render_text(&result)),
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
