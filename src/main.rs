use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use banter_gateway::pipeline::AudioUpload;
use banter_gateway::{ChatTurn, Config, Gateway, Persona, gateway};

/// Banter - voice chatbot gateway
#[derive(Parser)]
#[command(name = "banter", version, about)]
struct Cli {
    /// Port to listen on (overrides config file)
    #[arg(long, env = "BANTER_PORT")]
    port: Option<u16>,

    /// Directory of front-end assets to serve
    #[arg(long, env = "BANTER_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway (default)
    Serve,
    /// Transcribe an audio file through the normalize → STT pipeline
    Transcribe {
        /// Audio file in any format ffmpeg understands
        file: PathBuf,
    },
    /// Get a spoken reply from a persona
    Say {
        /// Persona to answer as (roy or randy)
        #[arg(short, long, default_value = "roy")]
        persona: String,
        /// Where to write the synthesized MP3
        #[arg(short, long, default_value = "reply.mp3")]
        out: PathBuf,
        /// What to say
        message: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,banter_gateway=info",
        1 => "info,banter_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.static_dir.is_some() {
        config.server.static_dir = cli.static_dir;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Transcribe { file } => transcribe_file(&config, file).await,
        Command::Say {
            persona,
            out,
            message,
        } => say(&config, &persona, out, message).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(port = config.server.port, "starting banter gateway");

    let gateway = Gateway::new(config)?;
    gateway.run().await?;

    Ok(())
}

/// Run one file through the transcribe pipeline and print the text
async fn transcribe_file(config: &Config, file: PathBuf) -> anyhow::Result<()> {
    let pipeline = gateway::transcribe_pipeline(config)?;

    let bytes = tokio::fs::read(&file).await?;
    let file_name = file.file_name().map(|n| n.to_string_lossy().into_owned());

    let result = pipeline
        .run(AudioUpload {
            bytes,
            mime_type: None,
            file_name,
        })
        .await?;

    println!("{}", result.text);
    Ok(())
}

/// Run one message through the chat pipeline and save the speech
async fn say(config: &Config, persona: &str, out: PathBuf, message: String) -> anyhow::Result<()> {
    let persona: Persona = persona.parse()?;
    let pipeline = gateway::chat_pipeline(config)?;

    let reply = pipeline.speak(ChatTurn { message, persona }).await?;
    println!("{}: {}", persona.name(), reply.text);

    if !reply.audio.is_empty() {
        tokio::fs::write(&out, &reply.audio).await?;
        println!("saved {} bytes of speech to {}", reply.audio.len(), out.display());
    }

    Ok(())
}
