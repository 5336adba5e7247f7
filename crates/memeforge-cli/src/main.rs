use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::future::join_all;
use memeforge_contracts::events::EventWriter;
use memeforge_contracts::prompt::augment;
use memeforge_contracts::providers::{ProviderOrder, ProviderSlot};
use memeforge_contracts::request::{
    GenerationRequest, Style, DEFAULT_HEIGHT, DEFAULT_STRENGTH, DEFAULT_WIDTH,
};
use memeforge_contracts::templates::TemplateCatalog;
use memeforge_engine::{EngineConfig, Orchestrator};
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Layer as _};

#[derive(Debug, Parser)]
#[command(name = "memeforge", version, about = "Meme image generation with provider fallback")]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Generate(GenerateArgs),
    Template(TemplateArgs),
    Status(StatusArgs),
    Augment(AugmentArgs),
    Templates(TemplatesArgs),
}

#[derive(Debug, Args)]
struct EngineArgs {
    /// Force a single provider, overriding IMAGE_GENERATION_PROVIDER.
    #[arg(long)]
    provider: Option<String>,
    /// Comma-separated provider order, overriding IMAGE_GENERATION_PROVIDER_ORDER.
    #[arg(long)]
    order: Option<String>,
    /// Artifact directory, overriding MEMEFORGE_UPLOAD_DIR.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Append generation events to this JSONL file.
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct PromptArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "cartoon")]
    style: String,
    #[arg(long, default_value_t = DEFAULT_STRENGTH, value_parser = clap::value_parser!(u8).range(1..=3))]
    strength: u8,
    #[arg(long)]
    meme_mode: bool,
    /// Send the prompt as typed, skipping augmentation.
    #[arg(long)]
    raw_prompt: bool,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[command(flatten)]
    prompt: PromptArgs,
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=6))]
    variants: u8,
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: u32,
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: u32,
    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct TemplateSource {
    /// Catalog id such as `dog` or `shock`.
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    path: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct TemplateArgs {
    #[command(flatten)]
    source: TemplateSource,
    #[command(flatten)]
    prompt: PromptArgs,
    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Debug, Args)]
struct StatusArgs {
    #[arg(long)]
    json: bool,
    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Debug, Args)]
struct AugmentArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "cartoon")]
    style: String,
    #[arg(long, default_value_t = DEFAULT_STRENGTH, value_parser = clap::value_parser!(u8).range(1..=3))]
    strength: u8,
    #[arg(long)]
    meme_mode: bool,
}

#[derive(Debug, Args)]
struct TemplatesArgs {
    /// Template directory, overriding MEMEFORGE_TEMPLATE_DIR.
    #[arg(long)]
    dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.log_json) {
        eprintln!("memeforge: logging disabled: {err:#}");
    }
    match run(cli.command).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("memeforge error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env("MEMEFORGE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_target(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .boxed()
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

async fn run(command: Command) -> Result<i32> {
    match command {
        Command::Generate(args) => run_generate(args).await,
        Command::Template(args) => run_template(args).await,
        Command::Status(args) => run_status(args),
        Command::Augment(args) => {
            let style = Style::parse(&args.style);
            println!("{}", augment(&args.prompt, &style, args.strength, args.meme_mode));
            Ok(0)
        }
        Command::Templates(args) => run_templates(args),
    }
}

fn engine_config(args: &EngineArgs) -> Result<EngineConfig> {
    let mut config = EngineConfig::from_env().context("invalid engine configuration")?;
    apply_overrides(&mut config, args);
    Ok(config)
}

fn apply_overrides(config: &mut EngineConfig, args: &EngineArgs) {
    if let Some(provider) = args.provider.as_deref().filter(|value| !value.trim().is_empty()) {
        config.forced_provider = Some(ProviderSlot::parse(provider));
    }
    if let Some(order) = args.order.as_deref() {
        config.provider_order = ProviderOrder::from_override(Some(order));
    }
    if let Some(out) = &args.out {
        config.upload_dir = out.clone();
    }
}

fn orchestrator(config: &EngineConfig, args: &EngineArgs) -> Result<Orchestrator> {
    let orchestrator = Orchestrator::from_config(config)?;
    let Some(events_path) = &args.events else {
        return Ok(orchestrator);
    };
    let session_id = uuid::Uuid::new_v4().simple().to_string();
    Ok(orchestrator.with_events(EventWriter::new(events_path, session_id)))
}

fn generation_prompt(args: &PromptArgs, style: &Style) -> String {
    if args.raw_prompt {
        return args.prompt.trim().to_string();
    }
    augment(&args.prompt, style, args.strength, args.meme_mode)
}

fn generation_request(args: &PromptArgs) -> Result<GenerationRequest> {
    if args.prompt.trim().is_empty() {
        bail!("--prompt must not be empty");
    }
    let style = Style::parse(&args.style);
    Ok(GenerationRequest::new(generation_prompt(args, &style), style).with_strength(args.strength))
}

fn template_catalog(dir: &Path) -> TemplateCatalog {
    TemplateCatalog::open(dir).unwrap_or_else(|err| {
        warn!(error = %format!("{err:#}"), "ignoring remote template index");
        TemplateCatalog::builtin(dir)
    })
}

async fn run_generate(args: GenerateArgs) -> Result<i32> {
    let request = generation_request(&args.prompt)?.with_dimensions(args.width, args.height);
    let config = engine_config(&args.engine)?;
    let orchestrator = orchestrator(&config, &args.engine)?;
    info!(
        order = ?orchestrator.order().names(),
        variants = args.variants,
        "generating"
    );

    let reports = join_all((0..args.variants).map(|_| orchestrator.generate_with_report(&request))).await;
    let all_mock = reports.iter().all(|report| report.result.is_mock);
    print_json(&json!({
        "prompt": request.prompt,
        "style": request.style.label(),
        "variants": reports,
        "all_mock": all_mock,
    }))?;
    Ok(0)
}

async fn run_template(args: TemplateArgs) -> Result<i32> {
    let request = generation_request(&args.prompt)?;
    let config = engine_config(&args.engine)?;
    let template_path = match (&args.source.id, &args.source.path) {
        (Some(id), _) => {
            let catalog = template_catalog(&config.template_dir);
            catalog
                .resolve(id)
                .map(|template| template.path)
                .with_context(|| {
                    format!(
                        "template '{id}' not found in {}",
                        catalog.template_dir().display()
                    )
                })?
        }
        (None, Some(path)) => {
            if !path.is_file() {
                bail!("template file not found: {}", path.display());
            }
            path.clone()
        }
        (None, None) => bail!("either --id or --path is required"),
    };

    let orchestrator = orchestrator(&config, &args.engine)?;
    let result = orchestrator
        .generate_from_template(&request, &template_path)
        .await;
    print_json(&serde_json::to_value(&result)?)?;
    Ok(0)
}

fn run_status(args: StatusArgs) -> Result<i32> {
    let config = engine_config(&args.engine)?;
    let rows = Orchestrator::from_config(&config)?.provider_status();
    if args.json {
        print_json(&serde_json::to_value(&rows)?)?;
        return Ok(0);
    }
    for row in rows {
        let state = if row.enabled { "enabled" } else { "disabled" };
        println!("{:<14} {:<9} {}", row.name, state, row.detail);
    }
    Ok(0)
}

fn run_templates(args: TemplatesArgs) -> Result<i32> {
    let dir = match args.dir {
        Some(dir) => dir,
        None => EngineConfig::from_env()?.template_dir,
    };
    let templates = template_catalog(&dir).list();
    print_json(&serde_json::to_value(&templates)?)?;
    Ok(0)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use memeforge_contracts::prompt::augment;
    use memeforge_contracts::providers::{ProviderIdentity, ProviderSlot};
    use memeforge_contracts::request::Style;
    use memeforge_engine::{EngineConfig, MapSource};

    use super::{apply_overrides, generation_prompt, generation_request, Cli, Command};

    #[test]
    fn generate_defaults() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["memeforge", "generate", "--prompt", "狗狗 smiling"])?;
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.prompt.style, "cartoon");
        assert_eq!(args.prompt.strength, 2);
        assert_eq!(args.variants, 1);
        assert_eq!((args.width, args.height), (512, 512));
        assert!(!args.prompt.raw_prompt);
        Ok(())
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(Cli::try_parse_from(["memeforge", "generate", "--prompt", "x", "--variants", "7"]).is_err());
        assert!(Cli::try_parse_from(["memeforge", "generate", "--prompt", "x", "--variants", "6"]).is_ok());
        assert!(Cli::try_parse_from(["memeforge", "augment", "--prompt", "x", "--strength", "0"]).is_err());
    }

    #[test]
    fn template_needs_exactly_one_source() {
        assert!(Cli::try_parse_from(["memeforge", "template", "--prompt", "x"]).is_err());
        assert!(Cli::try_parse_from([
            "memeforge", "template", "--prompt", "x", "--id", "dog", "--path", "a.png"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["memeforge", "template", "--prompt", "x", "--id", "dog"]).is_ok());
    }

    #[test]
    fn flags_override_environment() -> anyhow::Result<()> {
        let mut config = EngineConfig::from_source(&MapSource::from_pairs([
            ("IMAGE_PROVIDER_ORDER", "clipdrop,mock"),
        ]))?;
        let cli = Cli::try_parse_from([
            "memeforge", "status", "--provider", "local-webui", "--order", "replicate,mock", "--out", "/tmp/memes",
        ])?;
        let Command::Status(args) = cli.command else {
            panic!("expected status");
        };
        apply_overrides(&mut config, &args.engine);

        assert_eq!(
            config.forced_provider,
            Some(ProviderSlot::Known(ProviderIdentity::Webui))
        );
        assert_eq!(config.provider_order.names(), vec!["replicate", "mock"]);
        assert_eq!(config.effective_order().names(), vec!["webui"]);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/memes"));
        Ok(())
    }

    #[test]
    fn raw_prompt_skips_augmentation() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["memeforge", "generate", "--prompt", " plain cat ", "--raw-prompt"])?;
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(generation_prompt(&args.prompt, &Style::Cartoon), "plain cat");

        let cli = Cli::try_parse_from(["memeforge", "generate", "--prompt", "plain cat"])?;
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let augmented = generation_prompt(&args.prompt, &Style::Cartoon);
        assert!(augmented.starts_with("plain cat, "));
        assert!(augmented.len() > "plain cat".len());
        Ok(())
    }

    #[test]
    fn template_prompt_is_augmented() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "memeforge", "template", "--id", "dog", "--prompt", "dog wearing sunglasses",
            "--style", "anime", "--strength", "3", "--meme-mode",
        ])?;
        let Command::Template(args) = cli.command else {
            panic!("expected template");
        };
        let request = generation_request(&args.prompt)?;
        assert_eq!(
            request.prompt,
            augment("dog wearing sunglasses", &Style::Anime, 3, true)
        );
        assert_ne!(request.prompt, "dog wearing sunglasses");
        assert_eq!(request.strength, 3);

        let cli = Cli::try_parse_from([
            "memeforge", "template", "--id", "dog", "--prompt", " as typed ", "--raw-prompt",
        ])?;
        let Command::Template(args) = cli.command else {
            panic!("expected template");
        };
        assert_eq!(generation_request(&args.prompt)?.prompt, "as typed");
        Ok(())
    }

    #[test]
    fn blank_prompt_is_rejected() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["memeforge", "template", "--path", "a.png", "--prompt", "  "])?;
        let Command::Template(args) = cli.command else {
            panic!("expected template");
        };
        assert!(generation_request(&args.prompt).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn forced_mock_writes_placeholder_into_out_dir() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut config = EngineConfig::from_source(&MapSource::new())?;
        config.forced_provider = Some(ProviderSlot::Known(ProviderIdentity::Mock));
        config.upload_dir = temp.path().join("uploads");

        let orchestrator = memeforge_engine::Orchestrator::from_config(&config)?;
        let request = memeforge_contracts::request::GenerationRequest::new("x", Style::Cartoon);
        let result = orchestrator.generate(&request).await;
        assert!(result.is_mock);
        assert!(result.image_path.starts_with(temp.path()));
        Ok(())
    }
}
