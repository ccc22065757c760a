#![deny(warnings)]

use anyhow::Context;
use bytes::Bytes;
use clap::{ArgGroup, Parser};
use speakcheck_core::classify::BasicVoiceClassifier;
use speakcheck_core::config::{
    resolve_string_with_default, AnalysisConfig, StdEnv, WindowParams, DEFAULT_HOP_LEN,
    DEFAULT_LOG_LEVEL, DEFAULT_TARGET_SAMPLE_RATE, DEFAULT_WINDOW_LEN, ENV_LOG_LEVEL,
    ENV_SCRIPT_FILE,
};
use speakcheck_core::evaluate::{Evaluator, TakeId, TakeInput};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "speakcheck")]
#[command(about = "Score a recorded speech take against its expected script")]
#[command(group(
    ArgGroup::new("script")
        .required(true)
        .multiple(false)
        .args(["expected_script", "script_file"])
))]
#[command(group(
    ArgGroup::new("spoken")
        .required(true)
        .multiple(false)
        .args(["transcript", "transcript_file"])
))]
struct Args {
    /// Recorded take (any container with an audio track).
    media: PathBuf,

    /// Transcript of the take, as produced by a speech-to-text engine.
    #[arg(long)]
    transcript: Option<String>,

    /// File holding the transcript.
    #[arg(long)]
    transcript_file: Option<PathBuf>,

    /// Expected script, inline.
    #[arg(long)]
    expected_script: Option<String>,

    /// File holding the expected script.
    #[arg(long, env = ENV_SCRIPT_FILE)]
    script_file: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_TARGET_SAMPLE_RATE)]
    sample_rate: u32,

    #[arg(long, default_value_t = DEFAULT_WINDOW_LEN)]
    window_len: usize,

    #[arg(long, default_value_t = DEFAULT_HOP_LEN)]
    hop_len: usize,

    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let env = StdEnv;
    init_tracing(&resolve_string_with_default(
        args.log_level.clone(),
        ENV_LOG_LEVEL,
        &env,
        DEFAULT_LOG_LEVEL,
    ))?;

    let config = build_config(&args)?;
    let input = build_input(&args)?;

    tracing::info!(
        take = %input.take,
        sample_rate = config.target_sample_rate,
        window_len = config.window.window_len(),
        hop_len = config.window.hop_len(),
        "evaluating take"
    );

    let classifier = Arc::new(BasicVoiceClassifier::new(config.window.window_len()));
    let evaluator = Evaluator::new(config, classifier)?;
    let result = evaluator.evaluate(&input).await;

    if result.emotion.is_none() {
        tracing::warn!(take = %result.take, "no emotion data available for this take");
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("serializing evaluation result")?
    );

    Ok(())
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<AnalysisConfig> {
    let window = WindowParams::new(args.window_len, args.hop_len)?;
    Ok(AnalysisConfig::new(args.sample_rate, window)?)
}

fn build_input(args: &Args) -> anyhow::Result<TakeInput> {
    let media = std::fs::read(&args.media)
        .with_context(|| format!("reading media file {}", args.media.display()))?;

    let transcript = match (&args.transcript, &args.transcript_file) {
        (Some(t), None) => t.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading transcript file {}", path.display()))?,
        _ => unreachable!("clap requires exactly one transcript source"),
    };

    let expected_script = match (&args.expected_script, &args.script_file) {
        (Some(s), _) => s.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading script file {}", path.display()))?,
        (None, None) => unreachable!("clap requires one script source"),
    };

    let take = args
        .media
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("take")
        .to_owned();

    Ok(TakeInput {
        take: TakeId::new(take),
        media: Bytes::from(media),
        extension_hint: extension_of(&args.media),
        transcript,
        expected_script,
    })
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
