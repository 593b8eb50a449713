use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sotto::speech::{
    ConsoleEngine, NullAudioSession, StaticPreferences, UnavailableNeural, normalize,
};
use sotto::{SpeechConfig, SpeechPipeline, StreamSegmenter};

/// Sotto - incremental text-to-speech segmentation and playback
#[derive(Parser)]
#[command(name = "sotto", version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "SOTTO_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream text through the full pipeline and speak it on the console
    Speak {
        /// Text to speak; reads stdin when omitted
        text: Option<String>,

        /// Simulated stream chunk size, in characters
        #[arg(long, default_value = "24")]
        chunk_size: usize,

        /// Delay between simulated chunks, in milliseconds
        #[arg(long, default_value = "40")]
        delay_ms: u64,
    },
    /// Show how input text would be cut into utterances
    Segment {
        /// Text to segment; reads stdin when omitted
        text: Option<String>,
    },
    /// Show the speakable form of input text
    Normalize {
        /// Text to normalize; reads stdin when omitted
        text: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,sotto=info",
        1 => "info,sotto=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match cli.config {
        Some(path) => SpeechConfig::load(&path)?,
        None => SpeechConfig::default(),
    };

    match cli.command {
        Command::Speak {
            text,
            chunk_size,
            delay_ms,
        } => {
            let input = read_input(text)?;
            speak(&config, &input, chunk_size.max(1), delay_ms).await;
        }
        Command::Segment { text } => {
            let input = read_input(text)?;
            let mut segmenter = StreamSegmenter::new(config.segmentation);
            let mut utterances = segmenter.push(&input);
            utterances.extend(segmenter.flush());
            for (i, utterance) in utterances.iter().enumerate() {
                println!("{:>3}: {utterance}", i + 1);
            }
        }
        Command::Normalize { text } => {
            let input = read_input(text)?;
            println!("{}", normalize(&input));
        }
    }

    Ok(())
}

/// Stream the input through the pipeline in small chunks, as a live
/// response would arrive, and wait for playback to drain
async fn speak(config: &SpeechConfig, input: &str, chunk_size: usize, delay_ms: u64) {
    let pipeline = SpeechPipeline::spawn(
        config.segmentation.clone(),
        Arc::new(UnavailableNeural),
        Arc::new(ConsoleEngine),
        Arc::new(StaticPreferences::new(config.voice.clone())),
        Arc::new(NullAudioSession),
    );

    let chars: Vec<char> = input.chars().collect();
    for chunk in chars.chunks(chunk_size) {
        pipeline.push(&chunk.iter().collect::<String>());
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }
    pipeline.flush();
    pipeline.wait_until_idle().await;
    pipeline.stop();
}

fn read_input(text: Option<String>) -> anyhow::Result<String> {
    match text {
        Some(text) => Ok(text),
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}
