use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// Import the library
use creative_experience::async_api;
use creative_experience::{
    AdType, DiskStore, EndCardType, ExperienceError, ExperienceKind, SettingsCache,
};

/// Creative experience settings inspector
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the settings payload comes from
#[derive(Args)]
struct SettingsSource {
    /// Path to the settings JSON file
    #[arg(short, long)]
    input: PathBuf,

    /// Apply the rewarded default table
    #[arg(short, long)]
    rewarded: bool,
}

impl SettingsSource {
    fn kind(&self) -> ExperienceKind {
        ExperienceKind::from(self.rewarded)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a settings payload and print it in canonical form
    Decode {
        #[command(flatten)]
        source: SettingsSource,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Countdown value for a stage at the given elapsed time
    Countdown {
        #[command(flatten)]
        source: SettingsSource,

        /// Video duration in seconds; omit for non-video ads
        #[arg(long, allow_negative_numbers = true)]
        video_duration: Option<f64>,

        /// End card following the video (none, static, interactive)
        #[arg(long, default_value_t = EndCardType::None)]
        end_card: EndCardType,

        /// Stage index: 0 for the main ad, 1 for the end card
        #[arg(long, allow_negative_numbers = true)]
        index: isize,

        /// Seconds since the experience started
        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        elapsed: f64,
    },

    /// Time after which the whole experience closes
    CloseAfter {
        #[command(flatten)]
        source: SettingsSource,

        /// Video duration in seconds
        #[arg(long, allow_negative_numbers = true)]
        video_duration: f64,

        /// End card following the video (none, static, interactive)
        #[arg(long, default_value_t = EndCardType::None)]
        end_card: EndCardType,
    },

    /// Time until the skip or close action is enabled
    NextAction {
        #[command(flatten)]
        source: SettingsSource,

        /// Video duration in seconds
        #[arg(long, allow_negative_numbers = true, conflicts_with = "end_card")]
        video_duration: Option<f64>,

        /// End card type (none, static, interactive)
        #[arg(long)]
        end_card: Option<EndCardType>,
    },

    /// Manage settings cached per ad unit
    Cache {
        /// Cache directory
        #[arg(
            long,
            env = "CREATIVE_EXPERIENCE_CACHE_DIR",
            default_value = ".creative-experience-cache"
        )]
        cache_dir: PathBuf,

        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Decode a payload and cache it for an ad unit
    Put {
        /// Ad unit identifier
        #[arg(short, long)]
        ad_unit: String,

        #[command(flatten)]
        source: SettingsSource,
    },

    /// Print the settings cached for an ad unit
    Get {
        /// Ad unit identifier
        #[arg(short, long)]
        ad_unit: String,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Remove every cached entry
    Clear,
}

fn ad_type(video_duration: Option<f64>, end_card: EndCardType) -> Result<AdType, ExperienceError> {
    match video_duration {
        Some(duration) => Ok(AdType::vast(duration, end_card)),
        None if end_card.is_present() => Err(ExperienceError::InvalidArgument(
            "an end card requires --video-duration".to_string(),
        )),
        None => Ok(AdType::Other),
    }
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String, ExperienceError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode { source, pretty } => {
            let settings = async_api::read_settings(&source.input, source.kind()).await?;
            println!("{}", to_json(&settings, pretty)?);
        },
        Commands::Countdown { source, video_duration, end_card, index, elapsed } => {
            let settings = async_api::read_settings(&source.input, source.kind()).await?;
            let ad_type = ad_type(video_duration, end_card)?;
            println!("{}", settings.countdown_time(ad_type, index, elapsed));
        },
        Commands::CloseAfter { source, video_duration, end_card } => {
            let settings = async_api::read_settings(&source.input, source.kind()).await?;
            println!("{}", settings.close_after_duration(video_duration, end_card));
        },
        Commands::NextAction { source, video_duration, end_card } => {
            let settings = async_api::read_settings(&source.input, source.kind()).await?;
            let seconds = match (video_duration, end_card) {
                (Some(duration), _) => settings.time_until_next_action_for_video(duration),
                (None, Some(end_card)) => settings.time_until_next_action_for_end_card(end_card),
                (None, None) => {
                    return Err(ExperienceError::InvalidArgument(
                        "either --video-duration or --end-card is required".to_string(),
                    )
                    .into());
                }
            };
            println!("{}", seconds);
        },
        Commands::Cache { cache_dir, command } => {
            let cache = SettingsCache::new(DiskStore::new(cache_dir));
            match command {
                CacheCommands::Put { ad_unit, source } => {
                    let settings = async_api::read_settings(&source.input, source.kind()).await?;
                    cache.cache(&settings, &ad_unit)?;
                    let dir = cache.store().entries_dir();
                    println!("Cached settings for {} in {}", ad_unit, dir.display());
                },
                CacheCommands::Get { ad_unit, pretty } => match cache.cached_settings(&ad_unit) {
                    Some(settings) => println!("{}", to_json(&settings, pretty)?),
                    None => println!("No cached settings for {}", ad_unit),
                },
                CacheCommands::Clear => {
                    cache.evict_all()?;
                    println!("Cleared {}", cache.store().entries_dir().display());
                },
            }
        },
    }

    Ok(())
}
