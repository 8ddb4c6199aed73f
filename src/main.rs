use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use sightline_relay::capture::{FfmpegCamera, MediaCapture, StillImageCamera};
use sightline_relay::function::{Connector, FunctionHandler, Invocation};
use sightline_relay::provider::{GeminiClient, VisionProvider};
use sightline_relay::session::render_terminal;
use sightline_relay::voice::{EspeakSpeech, MutedSpeech, SpeechOutput, VoiceSelector};
use sightline_relay::{
    ApiServerBuilder, Config, PromptStyle, RelayClient, RelayService, SessionController, UiEvent,
};

/// Sightline - describe what the webcam sees, out loud
#[derive(Parser)]
#[command(name = "sightline", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay HTTP server (default)
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Handle one function invocation: request body on stdin, CGI response on stdout
    Invoke {
        /// HTTP method of the invocation
        #[arg(long, env = "REQUEST_METHOD", default_value = "POST")]
        method: String,
    },
    /// Capture frames and have them described and spoken
    Look {
        /// Serve this image file instead of opening a camera
        #[arg(long, conflicts_with = "device")]
        image: Option<PathBuf>,
        /// Camera device (default: the platform's first camera)
        #[arg(long)]
        device: Option<String>,
        /// Prompt sent with each frame
        #[arg(long)]
        prompt: Option<String>,
        /// Relay endpoint
        #[arg(long)]
        relay_url: Option<String>,
        /// Capture a single frame, then exit
        #[arg(long)]
        once: bool,
        /// Do not speak responses
        #[arg(long)]
        mute: bool,
    },
    /// List speech voices and show which one would be used
    Voices,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,sightline_relay=info",
        1 => "info,sightline_relay=debug",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries the CGI response for `invoke`; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
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
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Invoke { method } => invoke(config, method).await,
        Command::Look {
            image,
            device,
            prompt,
            relay_url,
            once,
            mute,
        } => {
            let source = match image {
                Some(path) => Source::Still(path),
                None => Source::Camera(device.or_else(|| config.client.camera_device.clone())),
            };
            look(&config, source, prompt, relay_url, once, mute).await
        }
        Command::Voices => voices(&config).await,
    }
}

fn gemini(
    config: &Config,
    api_key: SecretString,
) -> sightline_relay::Result<Arc<dyn VisionProvider>> {
    let client = GeminiClient::new(api_key)?
        .with_model(config.provider.model.clone())
        .with_base_url(config.provider.base_url.clone());
    Ok(Arc::new(client))
}

/// Long-running relay; a missing API key is fatal here
async fn serve(config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let api_key = SecretString::from(config.require_api_key()?.expose_secret());
    let provider = gemini(&config, api_key)?;

    let style = config.prompt.style.unwrap_or(PromptStyle::Plain);
    tracing::info!(
        provider = provider.name(),
        model = %config.provider.model,
        language = %config.prompt.language,
        %style,
        "starting sightline relay"
    );

    let relay = RelayService::new(Some(provider), style, config.prompt.language.clone());
    ApiServerBuilder::new(relay)
        .host(host.unwrap_or_else(|| config.server.host.clone()))
        .port(port.unwrap_or(config.server.port))
        .build()
        .run()
        .await?;

    Ok(())
}

/// One function invocation; a missing key is a 500 response, not a process failure
async fn invoke(config: Config, method: String) -> anyhow::Result<()> {
    let mut body = Vec::new();
    tokio::io::stdin().read_to_end(&mut body).await?;

    let style = config.prompt.style.unwrap_or(PromptStyle::Casual);
    let api_key = config
        .provider
        .api_key
        .as_ref()
        .map(|key| SecretString::from(key.expose_secret()));
    let language = config.prompt.language.clone();

    let connect: Connector = Box::new(move |key| gemini(&config, key));
    let handler = FunctionHandler::new(connect, style, language);

    let response = handler.invoke(Invocation { method, body }, api_key).await;
    tracing::info!(status = %response.status, "invocation handled");

    let mut stdout = std::io::stdout().lock();
    response.write_cgi(&mut stdout)?;
    stdout.flush()?;
    Ok(())
}

enum Source {
    Camera(Option<String>),
    Still(PathBuf),
}

fn speech_output(mute: bool) -> Box<dyn SpeechOutput> {
    if mute {
        return Box::new(MutedSpeech);
    }
    match EspeakSpeech::locate() {
        Ok(speech) => Box::new(speech),
        Err(e) => {
            tracing::warn!(error = %e, "speech disabled");
            Box::new(MutedSpeech)
        }
    }
}

/// Interactive client
async fn look(
    config: &Config,
    source: Source,
    prompt: Option<String>,
    relay_url: Option<String>,
    once: bool,
    mute: bool,
) -> anyhow::Result<()> {
    let camera: Box<dyn MediaCapture> = match source {
        Source::Camera(device) => Box::new(FfmpegCamera::new(device)),
        Source::Still(path) => Box::new(StillImageCamera::new(path)),
    };

    let relay = RelayClient::new(relay_url.as_deref().unwrap_or(&config.client.relay_url))?;
    tracing::info!(relay = %relay.url(), source = camera.name(), "starting session");

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let session = Arc::new(
        SessionController::new(camera, speech_output(mute), relay, events_tx)
            .with_prompt(prompt.unwrap_or_else(|| config.client.prompt.clone()))
            .with_quality(config.client.jpeg_quality)
            .with_voice(
                &config.client.voice_locale,
                &config.client.voice_fallback_language,
            ),
    );

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                UiEvent::Status(status) => println!("{status}"),
                UiEvent::Response(text) => println!("\nRespons AI:\n{}\n", render_terminal(&text)),
                UiEvent::Error(error) => eprintln!("{error}"),
            }
        }
    });

    if once {
        let result = match session.start().await {
            Ok(()) => session.capture_and_describe().await.map(drop),
            Err(e) => Err(e),
        };
        session.stop().await;
        drop(session);
        let _ = printer.await;
        return Ok(result?);
    }

    // Start failures are shown as UI events; the user can retry with `start`
    let _ = session.start().await;
    println!("Perintah: [c]apture, [s]top, start, [q]uit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" | "c" | "capture" => {
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    let _ = session.capture_and_describe().await;
                });
            }
            "s" | "stop" => session.stop().await,
            "start" => {
                let _ = session.start().await;
            }
            "q" | "quit" | "exit" => break,
            other => eprintln!("Perintah tidak dikenal: {other}"),
        }
    }

    session.stop().await;
    Ok(())
}

/// Print available voices and the one the selector picks
async fn voices(config: &Config) -> anyhow::Result<()> {
    let speech = EspeakSpeech::locate()?;
    let voices = speech.voices().await?;

    println!("{} voices via {}", voices.len(), speech.binary().display());
    for voice in &voices {
        let gender = voice.gender.map_or("-".to_string(), |g| format!("{g:?}"));
        let default = if voice.is_default { " (default)" } else { "" };
        println!("  {:<12} {:<8} {:<7} {}{default}", voice.id, voice.lang, gender, voice.name);
    }

    let selector = VoiceSelector::for_locale(
        &config.client.voice_locale,
        &config.client.voice_fallback_language,
    );
    match selector.select(&voices) {
        Some((rule, voice)) => println!(
            "\nselected for {}: {} ({}) by rule `{rule}`",
            config.client.voice_locale, voice.id, voice.name
        ),
        None => println!(
            "\nno voice matches {}; the synthesizer default will be used",
            config.client.voice_locale
        ),
    }

    Ok(())
}
