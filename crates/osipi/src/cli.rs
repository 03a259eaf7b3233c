//! Clap derive structures for the `osipi` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// osipi -- query and watch OSIsoft PI points from the command line
#[derive(Debug, Parser)]
#[command(
    name = "osipi",
    version,
    about = "Query OSIsoft PI Web API servers from the command line",
    long_about = "Search PI points, read their data streams, write values, and watch\n\
        streams for changes through the OSIsoft PI Web API.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "OSIPI_PROFILE", global = true)]
    pub profile: Option<String>,

    /// PI Web API root URL (overrides profile)
    #[arg(long, short = 'u', env = "OSIPI_URL", global = true)]
    pub url: Option<String>,

    /// Authentication method (overrides profile)
    #[arg(long, env = "OSIPI_AUTH", global = true)]
    pub auth: Option<AuthType>,

    /// Username for basic authentication
    #[arg(long, env = "OSIPI_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "OSIPI_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Skip TLS certificate verification (verifyssl = false)
    #[arg(long, short = 'k', env = "OSIPI_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "OSIPI_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Shared Enums ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthType {
    /// Kerberos / SPNEGO with a pre-negotiated token
    Kerberos,
    /// HTTP Basic
    Basic,
    /// No authentication
    Anonymous,
}

impl AuthType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kerberos => "kerberos",
            Self::Basic => "basic",
            Self::Anonymous => "anonymous",
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Stream to read or watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StreamArg {
    Current,
    End,
    Recorded,
    RecordedAt,
    Interpolated,
    InterpolatedAt,
    Plot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum UpdateOptionArg {
    #[default]
    Replace,
    Insert,
    NoReplace,
    ReplaceOnly,
    InsertNoCompression,
    Remove,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the service root and its links
    Info,

    /// Run an indexed search and show the raw hits
    Search(SearchArgs),

    /// Read and write PI point data
    #[command(alias = "pt")]
    Points(PointsArgs),

    /// Poll a stream and print every change
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

/// Point selection shared by every point command.
#[derive(Debug, Args)]
pub struct PointQuery {
    /// Search query, e.g. "name:sinusoid"
    pub query: String,

    /// Maximum number of search hits
    #[arg(long, short = 'n')]
    pub count: Option<u32>,
}

/// Time window shared by series reads.
#[derive(Debug, Args)]
pub struct WindowArgs {
    /// Start time (PI time expression or ISO-8601)
    #[arg(long, short = 's')]
    pub start: Option<String>,

    /// End time (PI time expression or ISO-8601)
    #[arg(long, short = 'e')]
    pub end: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SEARCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search query, e.g. "name:sinusoid"
    pub query: String,

    /// Maximum number of hits
    #[arg(long, short = 'n')]
    pub count: Option<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  POINTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PointsArgs {
    #[command(subcommand)]
    pub command: PointsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PointsCommand {
    /// List points matching a search query
    #[command(alias = "ls")]
    List(PointQuery),

    /// Current (snapshot) value
    Current {
        #[command(flatten)]
        select: PointQuery,

        /// Value at this time instead of now
        #[arg(long, short = 't')]
        time: Option<String>,
    },

    /// Last recorded value
    End {
        #[command(flatten)]
        select: PointQuery,
    },

    /// Recorded values over a time window
    Recorded {
        #[command(flatten)]
        select: PointQuery,

        #[command(flatten)]
        window: WindowArgs,

        /// Maximum number of values per point
        #[arg(long)]
        max_count: Option<u32>,
    },

    /// Recorded value at one time
    RecordedAt {
        #[command(flatten)]
        select: PointQuery,

        /// Timestamp to read
        #[arg(long, short = 't')]
        time: String,
    },

    /// Interpolated values over a time window
    Interpolated {
        #[command(flatten)]
        select: PointQuery,

        #[command(flatten)]
        window: WindowArgs,

        /// Sampling interval, e.g. "1h" or "30m"
        #[arg(long, short = 'i')]
        interval: Option<String>,
    },

    /// Interpolated values at explicit times
    InterpolatedAt {
        #[command(flatten)]
        select: PointQuery,

        /// Timestamps to read (repeatable)
        #[arg(long = "time", short = 't', required = true)]
        times: Vec<String>,
    },

    /// Values suited to plotting over a time window
    Plot {
        #[command(flatten)]
        select: PointQuery,

        #[command(flatten)]
        window: WindowArgs,

        /// Number of plot intervals
        #[arg(long)]
        intervals: Option<u32>,
    },

    /// Write a value to a single point
    Write {
        #[command(flatten)]
        select: PointQuery,

        /// Value to write (numbers are sent as numbers, anything else as text)
        value: String,

        /// Timestamp of the value
        #[arg(long, short = 't', default_value = "*")]
        time: String,

        /// How to treat an existing value at the same time
        #[arg(long, value_enum, default_value = "replace")]
        update_option: UpdateOptionArg,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub select: PointQuery,

    /// Stream to watch
    #[arg(long, value_enum, default_value = "current")]
    pub stream: StreamArg,

    /// Polling interval, e.g. "5s" or "1m"
    #[arg(long, default_value = "5s")]
    pub every: String,

    /// Stop after this many polls (default: until interrupted)
    #[arg(long)]
    pub times: Option<u32>,

    /// Timestamps for recorded-at / interpolated-at (repeatable);
    /// each one is watched separately
    #[arg(long = "at")]
    pub at: Vec<String>,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Interval for the interpolated stream
    #[arg(long, short = 'i')]
    pub interval: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Set a profile value
    Set {
        /// Profile key (url, auth_type, username, password_env, token_env,
        /// ca_cert, verifyssl, timeout)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store the profile's password or Kerberos token in the system keyring
    SetPassword {
        /// Profile to update (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
