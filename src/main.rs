// Terminal front end for report chat
//
// Opens a chat for one report and relays lines from stdin:
//   plain text      send as a text message
//   /voice on|off   toggle voice mode
//   /record         start recording (needs --voice-file)
//   /stop           stop recording and send the voice message
//   /cancel         discard the current recording
//   /lang <code>    switch language (en, hi, mr)
//   /gender <g>     switch reply voice (female, male)
//   /state          show session and capture state
//   /quit           exit
//
// Usage: report-chat --report cbc_2024 --report-type CBC --user-id u1 --token $TOKEN

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use report_chat::voice::UnavailableMicrophone;
use report_chat::{
    CallerIdentity, ChatOptions, Config, HttpAssistantClient, InitOutcome, Language, Message,
    MicrophoneBackend, ReportChat, ReportIdentity, Role, VoiceGender, WavDumpOutput,
    WavFileMicrophone,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "report-chat")]
#[command(about = "Chat with an assistant about a report, by text or voice")]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/report-chat")]
    config: String,

    /// Report name
    #[arg(short, long)]
    report: String,

    /// Report type
    #[arg(short = 't', long)]
    report_type: String,

    /// Caller user id
    #[arg(short, long)]
    user_id: String,

    /// Caller identity token
    #[arg(long, env = "REPORT_CHAT_TOKEN", hide_env_values = true)]
    token: String,

    /// Conversation language (overrides config)
    #[arg(short, long)]
    language: Option<Language>,

    /// Reply voice (overrides config)
    #[arg(short = 'g', long)]
    voice_gender: Option<VoiceGender>,

    /// WAV file replayed as microphone input
    #[arg(long)]
    voice_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = Config::load(&args.config)?;
    if let Some(language) = args.language {
        cfg.voice.language = language;
    }
    if let Some(voice_gender) = args.voice_gender {
        cfg.voice.voice_gender = voice_gender;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Assistant service: {}", cfg.assistant.base_url);

    let client = HttpAssistantClient::from_config(&cfg.assistant)
        .context("Failed to create assistant client")?;

    let microphone: Box<dyn MicrophoneBackend> = match &args.voice_file {
        Some(path) => Box::new(WavFileMicrophone::new(shellexpand::tilde(path).into_owned())),
        None => Box::new(UnavailableMicrophone),
    };

    let output_dir = PathBuf::from(shellexpand::tilde(&cfg.voice.output_dir).into_owned());
    let output = WavDumpOutput::new(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let chat = ReportChat::new(
        Arc::new(client),
        CallerIdentity::new(&args.user_id, &args.token),
        microphone,
        Arc::new(output),
        ChatOptions::from(&cfg),
    );

    let report = ReportIdentity::new(&args.report, &args.report_type)?;
    info!("Opening chat for {}", report);

    match chat.open_report(report).await {
        InitOutcome::Ready { session_id } => info!("Session {} ready", session_id),
        InitOutcome::Failed { attempts } => {
            warn!("Session unavailable after {} attempts", attempts)
        }
        other => info!("Session: {:?}", other),
    }
    print_notice(&chat).await;

    for message in chat.messages().await {
        print_message(&message);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut words = line.split_whitespace();
        match words.next().unwrap_or_default() {
            "/quit" => break,
            "/voice" => {
                let enabled = !matches!(words.next(), Some("off"));
                chat.set_voice_mode(enabled).await;
            }
            "/record" => {
                if let Err(e) = chat.start_recording().await {
                    warn!("{}", e);
                }
            }
            "/stop" => match chat.stop_recording().await {
                Ok(exchange) => {
                    print_message(&exchange.transcript);
                    print_message(&exchange.reply);
                }
                Err(e) => warn!("{}", e),
            },
            "/cancel" => chat.cancel_recording().await,
            "/lang" => match words.next().map(str::parse::<Language>) {
                Some(Ok(language)) => chat.set_language(language).await,
                Some(Err(e)) => warn!("{}", e),
                None => info!("Language: {}", chat.language().await.display_name()),
            },
            "/gender" => match words.next().map(str::parse::<VoiceGender>) {
                Some(Ok(gender)) => chat.set_voice_gender(gender).await,
                Some(Err(e)) => warn!("{}", e),
                None => info!("Voice: {}", chat.voice_gender().await.as_str()),
            },
            "/state" => {
                info!(
                    "Session {} ({}), capture {}, voice mode {}",
                    chat.session_state().await.as_str(),
                    chat.session_id().await.unwrap_or_else(|| "-".to_string()),
                    chat.capture_phase().await.as_str(),
                    if chat.voice_mode().await { "on" } else { "off" }
                );
            }
            command if command.starts_with('/') => warn!("Unknown command {}", command),
            _ => match chat.send_text(line).await {
                Ok(_) => {
                    if let Some(reply) = chat.messages().await.last() {
                        if reply.role == Role::Assistant {
                            print_message(reply);
                        }
                    }
                }
                Err(e) => warn!("{}", e),
            },
        }

        print_notice(&chat).await;
    }

    chat.set_voice_mode(false).await;
    info!("Bye");

    Ok(())
}

fn print_message(message: &Message) {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let voice = if message.is_voice { " (voice)" } else { "" };
    println!(
        "[{}] {}{}: {}",
        message.timestamp.format("%H:%M:%S"),
        who,
        voice,
        message.content
    );
}

async fn print_notice(chat: &ReportChat) {
    if let Some(notice) = chat.notice().await {
        println!("! {}", notice.text);
        chat.dismiss_notice().await;
    }
}
