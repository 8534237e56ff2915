use clap::{Parser, Subcommand};
use padmix::midi::{export_recording_json, export_recording_midi};
use padmix::patterns::{self, Intensity};
use padmix::quantize::beat_ms;
use padmix::{
    BeatOptions, BeatStyle, Config, DirectoryResolver, Instrument, MasterSettings, MixRequest,
    Mixdown, Recording, RenderOptions, TrackSettings,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Offline mixdown and beat generation
#[derive(Parser)]
#[command(name = "padmix")]
#[command(about = "Render instrument-pad recordings to a mixed WAV, or generate backing beats")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mix a session file to WAV
    Mix {
        /// Session JSON (recordings, track settings, master settings)
        session: PathBuf,

        /// Directory holding one <note>.wav per note key
        #[arg(short, long)]
        samples: PathBuf,

        /// Output WAV file
        #[arg(short, long, default_value = "mix.wav")]
        output: PathBuf,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Tempo override
        #[arg(long)]
        bpm: Option<f64>,

        /// Layer a generated backing beat under the recordings
        #[arg(long)]
        backing_beat: bool,

        /// Backing beat style (basic, hiphop, electronic, afrobeat)
        #[arg(long)]
        style: Option<BeatStyle>,

        /// Humanize the backing beat
        #[arg(long)]
        humanize: bool,

        /// Seed for reverb noise and humanization
        #[arg(long)]
        seed: Option<u64>,

        /// Abort the render after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Generate a beat pattern as MIDI or JSON
    Beat {
        #[arg(long, default_value = "basic")]
        style: BeatStyle,

        #[arg(long)]
        bpm: Option<f64>,

        #[arg(long, default_value_t = 4)]
        measures: u32,

        /// Quieter variant for layering over live drums
        #[arg(long)]
        subtle: bool,

        #[arg(long)]
        humanize: bool,

        #[arg(long)]
        seed: Option<u64>,

        /// Output file; .json writes the event list, anything else MIDI
        #[arg(short, long)]
        output: PathBuf,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

/// On-disk mix session
#[derive(Deserialize)]
struct Session {
    #[serde(default)]
    bpm: Option<f64>,
    recordings: Vec<Recording>,
    #[serde(default)]
    track_settings: BTreeMap<usize, TrackSettings>,
    #[serde(default)]
    master: MasterSettings,
    #[serde(default)]
    beat: BeatOptions,
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    Ok(match path {
        Some(path) => padmix::config::load_config(path)?,
        None => Config::default(),
    })
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.verbose && cli.quiet {
        anyhow::bail!("Cannot specify both --verbose and --quiet");
    }
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Mix {
            session,
            samples,
            output,
            config,
            bpm,
            backing_beat,
            style,
            humanize,
            seed,
            timeout_secs,
        } => {
            let config = load_config(config)?;
            let session: Session = serde_json::from_str(&std::fs::read_to_string(&session)?)?;

            let mut beat = session.beat;
            beat.enabled |= backing_beat;
            beat.humanize |= humanize;
            if let Some(style) = style {
                beat.style = style;
            }

            let request = MixRequest {
                bpm: bpm
                    .or(session.bpm)
                    .unwrap_or(config.tempo.default_bpm),
                track_settings: session.track_settings,
                master: session.master,
                beat,
            };

            let mut options = RenderOptions::default();
            if let Some(secs) = timeout_secs {
                options = options.with_timeout(Duration::from_secs(secs));
            }

            let resolver = DirectoryResolver::new(&samples);
            let mut rng = make_rng(seed);
            let mixdown = Mixdown::new(config);
            let result =
                mixdown.run(&session.recordings, &request, &resolver, &mut rng, &options)?;

            std::fs::write(&output, result.wav.as_slice())?;
            if !cli.quiet {
                println!(
                    "Mixed {} tracks ({:.1}s, {} events, {} skipped) to {}",
                    result.track_count,
                    result.duration_ms / 1000.0,
                    result.scheduled_events,
                    result.skipped_events,
                    output.display()
                );
            }
        }
        Commands::Beat {
            style,
            bpm,
            measures,
            subtle,
            humanize,
            seed,
            output,
            config,
        } => {
            let config = load_config(config)?;
            let bpm = bpm.unwrap_or(config.tempo.default_bpm);
            if !(bpm.is_finite() && bpm > 0.0) {
                anyhow::bail!("bpm must be > 0");
            }
            let intensity = if subtle {
                Intensity::Subtle
            } else {
                Intensity::Normal
            };

            let mut events = patterns::generate(style, beat_ms(bpm), measures, intensity);
            if humanize {
                let mut rng = make_rng(seed);
                events = padmix::humanize::humanize(&events, bpm, &config.humanize, &mut rng);
            }
            let duration = measures as f64 * 4.0 * beat_ms(bpm);
            let recording = Recording::new(Instrument::Drums, events, duration);

            let is_json = output
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if is_json {
                std::fs::write(&output, export_recording_json(&recording)?)?;
            } else {
                std::fs::write(&output, export_recording_midi(&recording, bpm)?)?;
            }
            if !cli.quiet {
                println!(
                    "Wrote {} {} measures ({} hits) to {}",
                    style,
                    measures,
                    recording.notes.len(),
                    output.display()
                );
            }
        }
        Commands::ValidateConfig { config } => {
            let config = padmix::config::load_config(config)?;
            println!("Configuration is valid");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::ShowConfig => {
            let config = Config::default();
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
    }

    Ok(())
}
