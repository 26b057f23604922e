use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use moderation_bridge::{BridgeNotifier, DiscordMessage, OutboxSink};
use moderation_watchlist::{
    ConsoleNotifier, Dispatcher, FanOut, LoginEvent, ModerationConfig, ReasonRemoval, Report,
    StaticSessions, Watchlist, CONFIG_FILE_NAME,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

mod output;

use output::{EntryView, JoinView, ListView, OutboxView, Output, RemovalView};

/// Spool file for bridge frames, relative to the data directory
pub const BRIDGE_OUTBOX_FILE: &str = "bridge.out";

#[derive(Parser)]
#[command(name = "moderation")]
#[command(about = "Player reports and moderation watchlist", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding config.toml and the record files
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Print results as JSON (implies --quiet)
    #[arg(long, global = true)]
    json: bool,

    /// Connected player as NAME:UUID[:IP]; repeatable
    #[arg(long = "online", global = true, value_parser = parse_online)]
    online: Vec<OnlinePlayer>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a proxy login
    Join(JoinArgs),

    /// Report a player to the moderators
    Report(ReportArgs),

    /// Manage the watchlist
    #[command(subcommand)]
    Watchlist(WatchlistCommand),

    /// Inspect the chat bridge outbox
    #[command(subcommand)]
    Bridge(BridgeCommand),

    /// Write a config.toml with default settings
    #[command(name = "init-config")]
    InitConfig(InitConfigArgs),
}

#[derive(Args)]
struct JoinArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    uuid: Uuid,

    /// Connection address, if known
    #[arg(long)]
    ip: Option<String>,
}

#[derive(Args)]
struct ReportArgs {
    player: String,

    #[arg(required = true, num_args = 1..)]
    reason: Vec<String>,

    /// Name of the reporting player
    #[arg(long)]
    by: String,

    /// Reporter has moderator rights
    #[arg(long)]
    moderator: bool,
}

#[derive(Subcommand)]
enum WatchlistCommand {
    /// Add a player (or another reason for a watched player)
    Add {
        player: String,
        #[arg(required = true, num_args = 1..)]
        reason: Vec<String>,
        #[arg(long)]
        by: String,
    },

    /// Remove a player with all aliases, or a single reason by its 1-based position
    Remove {
        player: String,
        position: Option<usize>,
    },

    /// List entries: `all`, `online` or a name filter
    List {
        #[arg(default_value = "all")]
        selection: String,
        #[arg(default_value_t = 1)]
        page: usize,
    },

    /// Show an entry with its reasons
    Show { player: String },

    /// Show entries sharing a player's address
    Aliases { player: String },
}

#[derive(Subcommand)]
enum BridgeCommand {
    /// Print pending bridge messages
    Outbox,
}

#[derive(Args)]
struct InitConfigArgs {
    /// Replace an existing config file
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Clone)]
struct OnlinePlayer {
    name: String,
    uuid: Uuid,
    ip: Option<String>,
}

fn parse_online(value: &str) -> std::result::Result<OnlinePlayer, String> {
    let mut parts = value.splitn(3, ':');
    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        return Err(format!("expected NAME:UUID[:IP], got '{value}'"));
    }
    let uuid = parts
        .next()
        .ok_or_else(|| format!("missing UUID in '{value}'"))?
        .parse::<Uuid>()
        .map_err(|err| format!("invalid UUID in '{value}': {err}"))?;
    let ip = parts.next().filter(|ip| !ip.is_empty()).map(str::to_string);
    Ok(OnlinePlayer {
        name: name.to_string(),
        uuid,
        ip,
    })
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet || cli.json {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn sessions(online: &[OnlinePlayer]) -> StaticSessions {
    let mut sessions = StaticSessions::new();
    for player in online {
        sessions.connect(&player.name, player.uuid, player.ip.clone());
    }
    sessions
}

async fn open_watchlist(cli: &Cli, config: ModerationConfig) -> Result<Watchlist> {
    let outbox = Arc::new(OutboxSink::new(cli.data_dir.join(BRIDGE_OUTBOX_FILE)));
    let notifier = FanOut::new()
        .with(Arc::new(ConsoleNotifier::new(config.clone())))
        .with(Arc::new(BridgeNotifier::new(config.clone(), outbox)));
    Watchlist::open(
        &cli.data_dir,
        config,
        Arc::new(sessions(&cli.online)),
        Dispatcher::spawn(Arc::new(notifier)),
    )
    .await
    .with_context(|| format!("Failed to open watchlist in {}", cli.data_dir.display()))
}

fn load_config(data_dir: &Path) -> Result<ModerationConfig> {
    let path = data_dir.join(CONFIG_FILE_NAME);
    ModerationConfig::load(&path).with_context(|| format!("Failed to load {}", path.display()))
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let output = match &cli.command {
        Commands::InitConfig(args) => run_init_config(&cli.data_dir, args).await?,
        Commands::Bridge(BridgeCommand::Outbox) => run_outbox(&cli.data_dir).await?,
        command => {
            let config = load_config(&cli.data_dir)?;
            let watchlist = open_watchlist(&cli, config).await?;
            let result = run_watchlist_command(&watchlist, command).await;
            // Deliver queued notices even when the command failed
            watchlist.close().await;
            result?
        }
    };

    output.print(cli.json)
}

async fn run_watchlist_command(watchlist: &Watchlist, command: &Commands) -> Result<Output> {
    match command {
        Commands::Join(args) => {
            let login = LoginEvent::new(args.name.clone(), args.uuid, args.ip.clone());
            let outcome = watchlist.on_join(&login).await;
            Ok(Output::Join(JoinView::from_outcome(&args.name, &outcome)))
        }
        Commands::Report(args) => {
            let report = Report {
                reporter: args.by.clone(),
                subject: args.player.clone(),
                reason: args.reason.join(" "),
                by_moderator: args.moderator,
            };
            let added = watchlist.report(&report).await?;
            Ok(Output::Reported {
                player: args.player.clone(),
                watchlist_key: added.map(|outcome| outcome.key().to_string()),
            })
        }
        Commands::Watchlist(command) => run_watchlist(watchlist, command).await,
        Commands::Bridge(_) | Commands::InitConfig(_) => bail!("command does not use the watchlist"),
    }
}

async fn run_watchlist(watchlist: &Watchlist, command: &WatchlistCommand) -> Result<Output> {
    match command {
        WatchlistCommand::Add { player, reason, by } => {
            let reason = reason.join(" ");
            let outcome = watchlist.add_reason(player, by, &reason, true).await?;
            Ok(Output::Added {
                player: player.clone(),
                key: outcome.key().to_string(),
                reason,
            })
        }
        WatchlistCommand::Remove { player, position } => {
            let removal = match position {
                Some(position) => match watchlist.remove_reason(player, *position).await? {
                    ReasonRemoval::Reason {
                        key,
                        reason,
                        remaining,
                    } => RemovalView::reason(key, *position, &reason, remaining),
                    ReasonRemoval::Entry(entry) => RemovalView::entries(std::slice::from_ref(&entry)),
                },
                None => RemovalView::entries(&watchlist.remove_entry(player).await?),
            };
            Ok(Output::Removed(removal))
        }
        WatchlistCommand::List { selection, page } => {
            let selection = watchlist.selection(selection);
            let page = watchlist.list(&selection, *page).await;
            Ok(Output::List(ListView::from_page(&page)))
        }
        WatchlistCommand::Show { player } => {
            let entry = watchlist.entry(player).await?;
            Ok(Output::Entry(EntryView::from_entry(&entry)))
        }
        WatchlistCommand::Aliases { player } => {
            let aliases = watchlist.find_aliases(player).await?;
            Ok(Output::Aliases {
                entries: aliases.iter().map(EntryView::from_entry).collect(),
            })
        }
    }
}

async fn run_outbox(data_dir: &Path) -> Result<Output> {
    let outbox = OutboxSink::new(data_dir.join(BRIDGE_OUTBOX_FILE));
    let frames = outbox
        .read_all()
        .await
        .with_context(|| format!("Failed to read {}", outbox.path().display()))?;
    let messages = frames
        .into_iter()
        .map(|frame| DiscordMessage::decode(frame.payload))
        .collect::<moderation_bridge::Result<Vec<_>>>()
        .context("Outbox holds an undecodable frame")?;
    Ok(Output::Outbox(OutboxView::from_messages(messages)))
}

async fn run_init_config(data_dir: &Path, args: &InitConfigArgs) -> Result<Output> {
    let path = data_dir.join(CONFIG_FILE_NAME);
    if !args.force && tokio::fs::try_exists(&path).await.unwrap_or(false) {
        bail!("{} already exists (use --force to replace it)", path.display());
    }
    tokio::fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    let text = ModerationConfig::default().to_toml_string()?;
    tokio::fs::write(&path, text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(Output::ConfigWritten {
        path: path.display().to_string(),
    })
}
