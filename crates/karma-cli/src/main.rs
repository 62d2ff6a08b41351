mod cmd_detect;
mod cmd_give;
mod cmd_log;
mod cmd_rank;
mod cmd_series;
mod cmd_serve;
mod cmd_show;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use karma_core::RankDirection;
use karma_ledger::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "karma",
    version,
    about = "Karma points for chat: ++/-- bookkeeping and leaderboards"
)]
struct Cli {
    /// SQLite file holding the karma ledger
    #[arg(long, global = true, env = "KARMA_DB", default_value = "karma.db")]
    db: PathBuf,
    /// Log level for karma's own crates (RUST_LOG takes precedence)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Slack bot: event endpoint plus the JSON chart API
    Serve {
        /// Address to listen on
        #[arg(long, env = "KARMA_LISTEN", default_value = "0.0.0.0:3000")]
        listen: String,
        /// Slack bot token (xoxb-...)
        #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
        slack_token: String,
        /// Slack signing secret; enables request signature checks
        #[arg(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
        signing_secret: Option<String>,
        /// Name the bot answers as and records corrections under
        #[arg(long, env = "KARMA_BOT_NAME", default_value = "karmabot")]
        bot_name: String,
        /// Bot user id (looked up with auth.test if omitted)
        #[arg(long, env = "KARMA_BOT_USER_ID")]
        bot_user_id: Option<String>,
    },
    /// Show how a message would be read, without recording anything
    Detect {
        /// Message text
        text: String,
        /// Author's user id, for self-targeting checks
        #[arg(long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a manual karma adjustment
    Give {
        target: String,
        /// Points to add (negative to deduct)
        #[arg(allow_negative_numbers = true)]
        delta: i64,
        /// Who the adjustment is attributed to
        #[arg(long)]
        actor: String,
    },
    /// Print one target's total
    Show { target: String },
    /// Highest totals
    Top {
        /// How many targets (default: 5)
        n: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Lowest totals
    Bottom {
        /// How many targets (default: 5)
        n: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cumulative totals per period for the ranked targets
    Series {
        /// How many targets to follow
        #[arg(long, default_value_t = karma_core::DEFAULT_RANK_SIZE)]
        n: usize,
        /// How many trailing periods to show
        #[arg(long, default_value_t = 12)]
        buckets: usize,
        /// day, week or month
        #[arg(long, default_value = "month")]
        granularity: String,
        /// Follow the lowest totals instead of the highest
        #[arg(long)]
        bottom: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recent ledger entries, newest first
    Log {
        /// Maximum entries (0 for all)
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(log_level: &str) {
    let default_filter = ["karma", "karma_core", "karma_ledger", "karma_rank", "karma_bot"]
        .iter()
        .map(|krate| format!("{krate}={log_level}"))
        .chain(std::iter::once("info".to_string()))
        .collect::<Vec<_>>()
        .join(",");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Open (creating on first use) the ledger at `db`.
pub(crate) fn open_ledger(db: &Path) -> anyhow::Result<SqliteStore> {
    SqliteStore::open_or_create(db).with_context(|| format!("opening ledger {}", db.display()))
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let db = cli.db.as_path();

    match cli.cmd {
        Command::Serve {
            listen,
            slack_token,
            signing_secret,
            bot_name,
            bot_user_id,
        } => cmd_serve::execute(&cmd_serve::ServeParams {
            db,
            listen: &listen,
            slack_token: &slack_token,
            signing_secret: signing_secret.as_deref(),
            bot_name: &bot_name,
            bot_user_id: bot_user_id.as_deref(),
        }),
        Command::Detect { text, user, json } => cmd_detect::execute(&text, user.as_deref(), json),
        Command::Give {
            target,
            delta,
            actor,
        } => cmd_give::execute(db, &target, delta, &actor),
        Command::Show { target } => cmd_show::execute(db, &target),
        Command::Top { n, json } => cmd_rank::execute(db, RankDirection::Top, n, json),
        Command::Bottom { n, json } => cmd_rank::execute(db, RankDirection::Bottom, n, json),
        Command::Series {
            n,
            buckets,
            granularity,
            bottom,
            json,
        } => cmd_series::execute(&cmd_series::SeriesParams {
            db,
            n,
            buckets,
            granularity: &granularity,
            bottom,
            json,
        }),
        Command::Log { limit, json } => cmd_log::execute(db, limit, json),
    }
}
