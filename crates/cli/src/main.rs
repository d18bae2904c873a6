use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use stream_control::{
    encode_style_image, GenerationIntent, HttpDispatchClient, LlmAugmenter, ModeTag,
    MotionProfile, SessionController, StreamConfig,
};

const GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

#[derive(Parser)]
#[command(name = "vsm-cli")]
#[command(about = "Visual stream mixer CLI - Headless control of a generative video stream")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the API base URL (defaults to env/service default)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Rendering pipeline id
    #[arg(long, global = true)]
    pipeline: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a stream session and print its playback info
    Create,

    /// Compose and push one visual prompt to the stream
    Submit {
        /// Base prompt text (mood tag or full scene description)
        prompt: String,

        /// Performance mode (ambient, vocal, stage)
        #[arg(long, default_value = "ambient")]
        mode: ModeTag,

        /// Motion profile (slow, medium, fast)
        #[arg(long, default_value = "medium")]
        motion: MotionProfile,

        /// Style reference image to bias the visuals toward
        #[arg(long)]
        style_image: Option<PathBuf>,

        /// Style transfer strength (0.0 - 2.0)
        #[arg(long, default_value_t = 1.3)]
        style_strength: f32,

        /// Expand the prompt through the LLM before composing
        /// (requires GEMINI_API_KEY)
        #[arg(long)]
        augment: bool,
    },

    /// Interactive console: type prompts, /live, /motion, /mode, /quit
    Console {
        #[arg(long, default_value = "ambient")]
        mode: ModeTag,

        #[arg(long, default_value = "medium")]
        motion: MotionProfile,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    // Credential read once at the process edge, then injected.
    let mut config = StreamConfig::from_env().context("load stream configuration")?;
    if let Some(base) = &cli.api_base {
        config = config.with_api_base(base.clone());
    }
    if let Some(pipeline) = &cli.pipeline {
        config = config.with_pipeline(pipeline.clone());
    }

    let dispatch = Arc::new(HttpDispatchClient::new(config.clone())?);

    match cli.command {
        Commands::Create => {
            let controller = SessionController::new(&config, dispatch);
            let session = controller.ensure_session().await?;
            print_session(&session);
        }

        Commands::Submit {
            prompt,
            mode,
            motion,
            style_image,
            style_strength,
            augment,
        } => {
            let mut controller = SessionController::new(&config, dispatch);
            if augment {
                controller = controller.with_augmenter(Arc::new(llm_augmenter()?));
            }

            let mut intent = GenerationIntent::new(prompt).with_mode(mode);
            if let Some(path) = style_image {
                let data_url = encode_style_image(&path)?;
                intent = intent.with_style_image(data_url, style_strength);
            }

            controller.submit(intent, motion).await?;
            if let Some(session) = controller.current_session().await {
                print_session(&session);
            }
            info!("prompt applied");
        }

        Commands::Console { mode, motion } => {
            let controller = SessionController::new(&config, dispatch);
            run_console(&controller, mode, motion).await?;
        }
    }

    Ok(())
}

fn llm_augmenter() -> Result<LlmAugmenter> {
    let key = std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY not set")?;
    Ok(LlmAugmenter::new(GEMINI_URL.to_string(), key))
}

fn print_session(session: &stream_control::Session) {
    println!("session:  {}", session.id);
    println!("playback: https://lvpr.tv/?v={}", session.output_locator);
    println!("ingest:   {}", session.ingest_endpoint);
}

async fn run_console(
    controller: &SessionController,
    mut mode: ModeTag,
    mut motion: MotionProfile,
) -> Result<()> {
    let session = controller.ensure_session().await?;
    print_session(&session);
    println!("type a prompt, /live, /mode <m>, /motion <m>, /quit");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if line == "/live" {
            match controller.return_to_live().await {
                Ok(()) => println!("live (passthrough)"),
                Err(err) => warn!("{err}"),
            }
            continue;
        }
        if let Some(value) = line.strip_prefix("/mode ") {
            match value.trim().parse() {
                Ok(parsed) => mode = parsed,
                Err(err) => warn!("{err}"),
            }
            continue;
        }
        if let Some(value) = line.strip_prefix("/motion ") {
            match value.trim().parse() {
                Ok(parsed) => motion = parsed,
                Err(err) => warn!("{err}"),
            }
            continue;
        }

        let intent = GenerationIntent::new(line).with_mode(mode);
        match controller.submit(intent, motion).await {
            Ok(()) => println!("applied ({motion})"),
            Err(err) => warn!("{err}"),
        }
    }

    Ok(())
}
