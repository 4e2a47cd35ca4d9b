//! CLI tool for browsing and editing ZIP, TAR and ARC archives.

mod commands;
mod exit_codes;
mod output;
mod password;
mod settings;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{Context, PasswdConfig};
use exit_codes::{ExitCode, error_to_exit_code};
use settings::Settings;

/// Browse and edit ZIP, TAR and ARC archives
#[derive(Parser)]
#[command(name = "zipup")]
#[command(author, version, about = "Browse and edit ZIP, TAR and ARC archives", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value = "human", global = true)]
    format: OutputFormat,

    /// Password for protected archives (prompted when needed and not given)
    #[arg(long, short = 'p', env = "ZIPUP_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// More log output (-v info, -vv debug)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty archive (.zip, .arc or .tar)
    Create {
        /// Archive file to create
        archive: PathBuf,
    },

    /// List one folder of the archive
    Ls {
        /// Archive file
        archive: PathBuf,

        /// Folder to list
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Write one entry to stdout
    Cat {
        /// Archive file
        archive: PathBuf,

        /// Entry path
        path: String,
    },

    /// Add files and directories
    Add {
        /// Archive file
        archive: PathBuf,

        /// Files and directories to add
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Folder inside the archive to add into
        #[arg(long, default_value = "")]
        into: String,
    },

    /// Create an empty folder
    Mkdir {
        /// Archive file
        archive: PathBuf,

        /// Folder name
        name: String,

        /// Parent folder inside the archive
        #[arg(long, default_value = "")]
        into: String,
    },

    /// Delete entries; paths ending in '/' delete whole folders
    Rm {
        /// Archive file
        archive: PathBuf,

        /// Entry paths
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Rename an entry or move a folder
    Mv {
        /// Archive file
        archive: PathBuf,

        /// Current path
        old: String,

        /// New path
        new: String,
    },

    /// Show or set the archive comment
    Comment {
        /// Archive file
        archive: PathBuf,

        /// New comment; an empty string removes it
        #[arg(long)]
        set: Option<String>,
    },

    /// Set, change or remove the archive password
    Passwd {
        /// Archive file
        archive: PathBuf,

        /// Current password (defaults to --password)
        #[arg(long)]
        old: Option<String>,

        /// New password (prompted when not given)
        #[arg(long, conflicts_with = "remove")]
        new: Option<String>,

        /// Encryption scheme (defaults to the configured one)
        #[arg(long, value_enum)]
        scheme: Option<SchemeArg>,

        /// Remove protection
        #[arg(long)]
        remove: bool,
    },

    /// Find entries whose path contains TEXT, ignoring case
    Search {
        /// Archive file
        archive: PathBuf,

        /// Text to look for
        text: String,
    },

    /// Extract everything, or the given entries and folders
    Extract {
        /// Archive file
        archive: PathBuf,

        /// Destination directory
        dest: PathBuf,

        /// Entry paths; folders end with '/'
        paths: Vec<String>,
    },

    /// Show archive information
    Info {
        /// Archive file
        archive: PathBuf,
    },

    /// Show or change settings (language, encryption)
    Config {
        /// Setting name
        key: Option<String>,

        /// New value
        value: Option<String>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum SchemeArg {
    Aes,
    Zipcrypto,
}

impl From<SchemeArg> for zipup::CipherScheme {
    fn from(scheme: SchemeArg) -> Self {
        match scheme {
            SchemeArg::Aes => zipup::CipherScheme::Aes,
            SchemeArg::Zipcrypto => zipup::CipherScheme::LegacyZipCrypto,
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let result = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if result.is_err() {
        eprintln!("Unable to set global default subscriber");
    }
}

fn run(cli: Cli) -> zipup::Result<ExitCode> {
    let ctx = Context {
        format: cli.format,
        password: cli.password,
    };

    match cli.command {
        Commands::Create { archive } => commands::create(&archive, &ctx),
        Commands::Ls { archive, prefix } => commands::ls(&archive, &prefix, &ctx),
        Commands::Cat { archive, path } => commands::cat(&archive, &path, &ctx),
        Commands::Add {
            archive,
            files,
            into,
        } => commands::add(&archive, &files, &into, &ctx),
        Commands::Mkdir {
            archive,
            name,
            into,
        } => commands::mkdir(&archive, &name, &into, &ctx),
        Commands::Rm { archive, paths } => commands::rm(&archive, &paths, &ctx),
        Commands::Mv { archive, old, new } => commands::mv(&archive, &old, &new, &ctx),
        Commands::Comment { archive, set } => commands::comment(&archive, set.as_deref(), &ctx),
        Commands::Passwd {
            archive,
            old,
            new,
            scheme,
            remove,
        } => {
            let settings = match Settings::default_path() {
                Some(path) => Settings::load_from(&path)?,
                None => Settings::default(),
            };
            commands::passwd(
                &PasswdConfig {
                    archive_path: &archive,
                    old,
                    new,
                    scheme: scheme.map(Into::into),
                    remove,
                },
                &settings,
                &ctx,
            )
        }
        Commands::Search { archive, text } => commands::search(&archive, &text, &ctx),
        Commands::Extract {
            archive,
            dest,
            paths,
        } => commands::extract(&archive, &dest, &paths, &ctx),
        Commands::Info { archive } => commands::info(&archive, &ctx),
        Commands::Config { key, value } => commands::config(key.as_deref(), value.as_deref()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            error_to_exit_code(&e)
        }
    };

    std::process::exit(exit_code.code());
}
