//! CLI binary for stakeholder meetings.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use stakeholder_voice::analysis::generate_conversation_context;
use stakeholder_voice::audio::{AudioEngine, SilentEngine};
use stakeholder_voice::{
    EnhancementOptions, Meeting, MeetingConfig, PersonalityEngine, ProfileRegistry, Scenario,
    SpeechOutput,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Practice requirements elicitation with simulated stakeholders.
#[derive(Parser)]
#[command(name = "stakeholder-meeting", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scenario file with `[project]` and `[[stakeholders]]`.
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Personality profiles file replacing the built-in profiles.
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Hold a meeting over stdin.
    Chat {
        /// Speak every stakeholder reply.
        #[arg(long)]
        voice: bool,
    },

    /// Print the personalised SSML for a reply.
    Ssml {
        /// Stakeholder id, e.g. `james-walker`.
        stakeholder: String,
        /// Reply text to enhance.
        text: String,
        /// Learner message the reply answers.
        #[arg(long, default_value = "")]
        prompt: String,
        /// RNG seed for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List personality profiles.
    Profiles,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for SSML and transcripts.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("stakeholder_voice=info,stakeholder_meeting=info,reqwest=warn")
            }),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => MeetingConfig::from_file(path)?,
        None => {
            let path = MeetingConfig::default_config_path();
            if path.is_file() {
                MeetingConfig::from_file(&path)?
            } else {
                MeetingConfig::default()
            }
        }
    };
    config.apply_env_overrides();

    let registry = Arc::new(match cli.profiles {
        Some(ref path) => ProfileRegistry::from_file(path)?,
        None => ProfileRegistry::builtin()?,
    });
    let scenario = match cli.scenario {
        Some(ref path) => Scenario::from_file(path)?,
        None => Scenario::builtin()?,
    };

    match cli.command.unwrap_or(Command::Chat { voice: false }) {
        Command::Chat { voice } => start_chat(config, scenario, registry, voice).await,
        Command::Ssml {
            stakeholder,
            text,
            prompt,
            seed,
        } => print_ssml(&config, &scenario, registry, &stakeholder, &text, &prompt, seed),
        Command::Profiles => {
            list_profiles(&registry);
            Ok(())
        }
    }
}

#[cfg(feature = "native-audio")]
async fn start_chat(
    config: MeetingConfig,
    scenario: Scenario,
    registry: Arc<ProfileRegistry>,
    voice: bool,
) -> anyhow::Result<()> {
    use stakeholder_voice::audio::native::CpalEngine;

    if voice {
        match CpalEngine::new(&config.playback) {
            Ok(engine) => {
                let meeting = Meeting::from_config(&config, scenario, registry, engine)?;
                return run_chat(meeting, voice).await;
            }
            Err(e) => warn!("audio output unavailable, replies will not be audible: {e}"),
        }
    }
    let meeting = Meeting::from_config(&config, scenario, registry, SilentEngine)?;
    run_chat(meeting, voice).await
}

#[cfg(not(feature = "native-audio"))]
async fn start_chat(
    config: MeetingConfig,
    scenario: Scenario,
    registry: Arc<ProfileRegistry>,
    voice: bool,
) -> anyhow::Result<()> {
    if voice && config.speech.is_configured() {
        warn!("built without native-audio; cloud audio is synthesized but not played");
    }
    let meeting = Meeting::from_config(&config, scenario, registry, SilentEngine)?;
    run_chat(meeting, voice).await
}

async fn run_chat<E: AudioEngine>(mut meeting: Meeting<E>, voice: bool) -> anyhow::Result<()> {
    println!("Stakeholder meeting v{}", env!("CARGO_PKG_VERSION"));
    println!("\n{}", meeting.project().name);
    for s in meeting.stakeholders() {
        println!("  {} - {}, {}", s.name, s.role, s.department);
    }
    println!("\nType a message and press Enter. /transcript prints the meeting, /quit leaves.\n");

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" => break,
            "/transcript" => {
                println!("{}", meeting.transcript());
                continue;
            }
            _ => {}
        }

        let reply = match meeting.submit(line, &cancel).await {
            Ok(reply) => reply,
            Err(e) => {
                eprintln!("! {e}");
                if e.is_config() {
                    break;
                }
                continue;
            }
        };
        println!(
            "{} ({}): {}\n",
            reply.display_name(),
            reply.stakeholder_role.as_deref().unwrap_or_default(),
            reply.content
        );

        if voice {
            match meeting.voice_message(&reply.id, &cancel).await {
                Ok(SpeechOutput::Audio(_)) => {
                    let playback = meeting.playback_mut();
                    tokio::select! {
                        () = cancel.cancelled() => {}
                        () = playback.wait_until_idle(Duration::from_millis(50)) => {}
                    }
                    playback.stop();
                }
                Ok(SpeechOutput::Spoken) => {}
                Err(e) => eprintln!("! audio: {e}"),
            }
        }
    }

    meeting.playback_mut().stop();
    Ok(())
}

fn print_ssml(
    config: &MeetingConfig,
    scenario: &Scenario,
    registry: Arc<ProfileRegistry>,
    stakeholder: &str,
    text: &str,
    prompt: &str,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let member = scenario.stakeholders.iter().find(|s| s.id == stakeholder);
    if member.is_none() && registry.get(stakeholder).is_none() {
        warn!(stakeholder, "unknown stakeholder; printing plain SSML");
    }
    let role = member.map_or("", |s| s.role.as_str());
    let ctx = generate_conversation_context(prompt, &[], role);
    let mut options = EnhancementOptions::default();
    if let Some(s) = member {
        options = options.with_fallback_voice(&s.voice);
    }

    let engine = PersonalityEngine::from_config(registry, config);
    let mut rng = match seed.or(config.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    println!(
        "{}",
        engine.generate_personalized_ssml(text, stakeholder, &ctx, &options, &mut rng)
    );
    Ok(())
}

fn list_profiles(registry: &ProfileRegistry) {
    for (id, profile) in registry.iter() {
        let templates = if profile.has_rich_templates() {
            " (tiered)"
        } else {
            ""
        };
        println!("{id:<16} {:<20} {}{templates}", profile.voice, profile.style);
    }
}
