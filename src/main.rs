use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use elyria::api::{render_report, BatchGenerator, ImageClient};
use elyria::config::{
    ApiConfig, Device, PipelineConfig, Resolution, API_KEY_ENV, DEFAULT_MODEL, DEFAULT_TTS_PROGRAM,
};
use elyria::error::require_file;
use elyria::monitor::{Monitor, MonitorConfig};
use elyria::prompt::insert_infoboxes;
use elyria::script::load_script;
use elyria::video::encoder::FfmpegEncoder;
use elyria::video::muxer::{FfmpegMuxer, MuxOutcome};
use elyria::video::{Fallback, RunReport, VideoGenerator};
use elyria::voice::{synthesize_script, CommandSynthesizer};

#[derive(Parser, Debug)]
#[command(name = "elyria")]
#[command(about = "Narrated slideshow videos from annotated scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a narrated slideshow from a script with [IMG: ...] directives
    Video(VideoArgs),
    /// Insert image directives into a plain script and optionally fetch image URLs
    Infobox(InfoboxArgs),
    /// Speak a whole script into one audio file
    Voice(VoiceArgs),
    /// Watch notebook kernels for failures
    Monitor(MonitorArgs),
}

#[derive(Args, Debug)]
struct VideoArgs {
    /// Delay between image generations in seconds (accepted, unused)
    #[arg(long, default_value_t = 5.0)]
    delay: f64,

    /// Similarity threshold (accepted, unused)
    #[arg(long, default_value_t = 0.65)]
    similarity: f64,

    /// Image API base URL
    #[arg(long)]
    api_endpoint: String,

    /// Image API key (falls back to ELYRIA_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Image model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Video resolution as WIDTHxHEIGHT
    #[arg(long, default_value = "1920x1080")]
    resolution: Resolution,

    /// Reference voice sample
    #[arg(long)]
    voice: PathBuf,

    /// Script file with [IMG: ...] directives
    #[arg(long)]
    script: PathBuf,

    /// Output video path
    #[arg(short, long, default_value = "output/video.mp4")]
    output: PathBuf,

    /// Device for the voice model (cpu, cuda, gpu, tpu)
    #[arg(long, default_value = "cpu")]
    device: Device,

    /// ffmpeg executable used for encoding and merging
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Voice synthesis program
    #[arg(long, default_value = DEFAULT_TTS_PROGRAM)]
    tts_program: PathBuf,

    /// Timeout for each image request, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct InfoboxArgs {
    /// Plain script to annotate
    #[arg(long)]
    script: PathBuf,

    /// Annotated script path (defaults to <stem>_with_infoboxes.txt)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Image API base URL; without it only the annotated script is written
    #[arg(long)]
    api_endpoint: Option<String>,

    /// Image API key (falls back to ELYRIA_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Image model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Attempts per prompt
    #[arg(long, default_value_t = 3)]
    max_retries: u32,
}

#[derive(Args, Debug)]
struct VoiceArgs {
    /// Reference voice sample
    #[arg(long)]
    voice: PathBuf,

    /// Script to speak
    #[arg(long)]
    script: PathBuf,

    /// Output audio path
    #[arg(short, long)]
    output: PathBuf,

    #[arg(long, default_value = "cpu")]
    device: Device,

    #[arg(long, default_value = DEFAULT_TTS_PROGRAM)]
    tts_program: PathBuf,
}

#[derive(Args, Debug)]
struct MonitorArgs {
    /// Account that owns the kernels
    #[arg(long)]
    owner: String,

    /// Kernel slug to watch; repeat for several (defaults to the built-in list)
    #[arg(long = "kernel")]
    kernels: Vec<String>,

    #[arg(long, default_value = "monitoring/logs")]
    log_dir: PathBuf,

    #[arg(long, default_value_t = 60)]
    interval_secs: u64,

    /// Check every kernel once and exit
    #[arg(long)]
    once: bool,

    /// Commit and push a fix record for each failing kernel
    #[arg(long)]
    repair: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Video(args) => run_video(args).await,
        Commands::Infobox(args) => run_infobox(args).await,
        Commands::Voice(args) => run_voice(args).await,
        Commands::Monitor(args) => run_monitor(args).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn api_key(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var(API_KEY_ENV).ok())
        .filter(|key| !key.trim().is_empty())
}

async fn run_video(args: VideoArgs) -> anyhow::Result<()> {
    let Some(key) = api_key(args.api_key) else {
        anyhow::bail!("API key not found. Pass --api-key or set {}", API_KEY_ENV);
    };
    require_file("Voice", &args.voice)?;
    require_file("Script", &args.script)?;

    info!("Parsing script...");
    let segments = load_script(&args.script)
        .await
        .with_context(|| format!("Failed to read script: {}", args.script.display()))?;
    info!("Parsed {} segments", segments.len());

    let mut api = ApiConfig::new(args.api_endpoint, key);
    api.model = args.model;
    api.timeout = args.timeout_secs.map(Duration::from_secs);
    let images = ImageClient::new(api)?;
    let synth = CommandSynthesizer::new(args.tts_program, args.device);
    let encoder = FfmpegEncoder::new(&args.ffmpeg);
    let muxer = FfmpegMuxer::new(&args.ffmpeg);

    let mut config = PipelineConfig::new(args.output, args.voice);
    config.resolution = args.resolution;
    config.delay = args.delay;
    config.similarity = args.similarity;

    let generator = VideoGenerator::new(config, &images, &synth, &encoder, &muxer);
    let report = generator
        .generate_video(&segments)
        .await
        .context("Video generation failed")?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    match &report.output {
        Some(MuxOutcome::Merged(path)) => {
            println!("Final video with audio created: {}", path.display());
        }
        Some(MuxOutcome::Separate {
            video,
            audio,
            command,
            ..
        }) => {
            println!("Video created: {}", video.display());
            println!("Audio created: {}", audio.display());
            println!("Note: To combine video and audio, install ffmpeg and run:");
            println!("{}", command);
        }
        None => println!("No audio segments to process"),
    }

    for fallback in &report.fallbacks {
        match fallback {
            Fallback::Image { prompt, reason } => {
                warn!("Placeholder used for image '{:.50}': {}", prompt, reason)
            }
            Fallback::Voice { sentence, reason } => {
                warn!("Silence used for sentence '{:.50}': {}", sentence, reason)
            }
        }
    }
    info!(
        "Video creation complete: {} sentences, {} slides, {} frames, {} fallbacks",
        report.sentences,
        report.slides,
        report.frames,
        report.fallbacks.len()
    );
}

/// `<dir>/<stem><suffix>` next to `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", stem, suffix))
}

async fn run_infobox(args: InfoboxArgs) -> anyhow::Result<()> {
    require_file("Input script", &args.script)?;
    let output = args
        .output
        .unwrap_or_else(|| sibling(&args.script, "_with_infoboxes.txt"));

    info!("Analyzing script file: {}", args.script.display());
    let content = tokio::fs::read_to_string(&args.script)
        .await
        .with_context(|| format!("Failed to read script: {}", args.script.display()))?;
    let result = insert_infoboxes(&content);
    tokio::fs::write(&output, &result.script)
        .await
        .with_context(|| format!("Failed to write: {}", output.display()))?;
    println!("Infoboxes added to: {}", output.display());
    info!("Inserted {} image directives", result.prompts.len());

    let (Some(endpoint), Some(key)) = (args.api_endpoint, api_key(args.api_key)) else {
        info!("No API endpoint or key given, skipping image generation");
        for (i, prompt) in result.prompts.iter().enumerate() {
            info!("Prompt {}: {}", i + 1, prompt);
        }
        return Ok(());
    };

    let mut api = ApiConfig::new(endpoint, key);
    api.model = args.model;
    let batch = BatchGenerator::new(api, args.max_retries)?;
    let urls = batch.generate_all(&result.prompts).await;

    let report_path = sibling(&output, "_image_report.txt");
    tokio::fs::write(&report_path, render_report(&result.prompts, &urls))
        .await
        .with_context(|| format!("Failed to write: {}", report_path.display()))?;
    let generated = urls.iter().filter(|u| u.is_some()).count();
    println!("Generated {}/{} images", generated, urls.len());
    println!("Image report saved to: {}", report_path.display());
    Ok(())
}

async fn run_voice(args: VoiceArgs) -> anyhow::Result<()> {
    let synth = CommandSynthesizer::new(args.tts_program, args.device);
    synthesize_script(&synth, &args.script, &args.voice, &args.output)
        .await
        .context("Voice synthesis failed")?;
    Ok(())
}

async fn run_monitor(args: MonitorArgs) -> anyhow::Result<()> {
    let mut config = MonitorConfig::new(args.owner);
    if !args.kernels.is_empty() {
        config.kernels = args.kernels;
    }
    config.log_dir = args.log_dir;
    config.interval = Duration::from_secs(args.interval_secs);
    config.once = args.once;
    config.repair = args.repair;

    let reports = Monitor::new(config).run().await?;
    let failing = reports.iter().filter(|r| !r.verdict.is_healthy()).count();
    info!("{} of {} kernels healthy", reports.len() - failing, reports.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_keeps_directory_and_stem() {
        assert_eq!(
            sibling(Path::new("scripts/story.txt"), "_with_infoboxes.txt"),
            PathBuf::from("scripts/story_with_infoboxes.txt")
        );
        assert_eq!(
            sibling(Path::new("out/story_with_infoboxes.txt"), "_image_report.txt"),
            PathBuf::from("out/story_with_infoboxes_image_report.txt")
        );
    }

    #[test]
    fn cli_parses_video_defaults() {
        let cli = Cli::try_parse_from([
            "elyria",
            "video",
            "--api-endpoint",
            "https://api.example.com/v4",
            "--voice",
            "voice.wav",
            "--script",
            "script.txt",
        ])
        .unwrap();
        let Commands::Video(args) = cli.command else {
            panic!("expected video subcommand");
        };
        assert_eq!(args.resolution, Resolution::new(1920, 1080));
        assert_eq!(args.device, Device::Cpu);
        assert_eq!(args.output, PathBuf::from("output/video.mp4"));
        assert_eq!(args.model, DEFAULT_MODEL);
        assert_eq!(args.delay, 5.0);
    }

    #[test]
    fn cli_rejects_bad_resolution() {
        let parsed = Cli::try_parse_from([
            "elyria",
            "video",
            "--api-endpoint",
            "x",
            "--voice",
            "v.wav",
            "--script",
            "s.txt",
            "--resolution",
            "wide",
        ]);
        assert!(parsed.is_err());
    }
}
