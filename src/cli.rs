use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::installer::{InstallOptions, default_install_dir};
use crate::locate::LocatorOptions;

#[derive(Parser, Debug)]
#[command(name = "sfxzip")]
#[command(version)]
#[command(about = "Self-extracting installer: unpack the ZIP payload carried by an executable", long_about = None)]
#[command(after_help = "Examples:\n  \
  sfxzip                                  install from the running executable into ./Ausic\n  \
  sfxzip install -d \"C:/Program Files/Ausic\"   install into a chosen directory\n  \
  sfxzip append setup.exe app.zip -o installer.exe   build an installer\n  \
  sfxzip locate installer.exe             show where the payload sits")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// More log output (-vv => debug)
    #[arg(short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Unpack the embedded payload (the default)
    Install(InstallArgs),

    /// Show where the payload sits inside an executable
    Locate {
        /// Executable to inspect
        #[arg(value_name = "HOST")]
        host: PathBuf,

        /// Tail bytes searched for an End of Central Directory record
        #[arg(long, value_name = "BYTES")]
        window: Option<u64>,
    },

    /// Check that a ZIP file is a sound container
    Validate {
        #[arg(value_name = "ZIP")]
        zip: PathBuf,
    },

    /// List the entries of the payload inside an executable
    List {
        #[arg(value_name = "HOST")]
        host: PathBuf,
    },

    /// Append a ZIP to an executable, producing an installer
    Append {
        #[arg(value_name = "EXE")]
        exe: PathBuf,

        #[arg(value_name = "ZIP")]
        zip: PathBuf,

        /// Write the installer here instead of modifying EXE in place
        #[arg(short = 'o', value_name = "OUT")]
        output: Option<PathBuf>,

        /// Do not write the metadata footer
        #[arg(long)]
        no_footer: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
    /// Install into DIR (default: ./Ausic)
    #[arg(short = 'd', value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Read the payload from HOST instead of the running executable
    #[arg(long, value_name = "HOST")]
    pub host: Option<PathBuf>,

    /// Delay before starting, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 100)]
    pub delay_ms: u64,

    /// Pause after each progress message, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 100)]
    pub pause_ms: u64,
}

impl Default for InstallArgs {
    fn default() -> Self {
        Self {
            target: None,
            host: None,
            delay_ms: 100,
            pause_ms: 100,
        }
    }
}

impl InstallArgs {
    pub fn to_options(&self) -> InstallOptions {
        InstallOptions {
            host_path: self.host.clone(),
            target_dir: self.target.clone().unwrap_or_else(default_install_dir),
            scratch_parent: None,
            start_delay: Duration::from_millis(self.delay_ms),
            progress_pause: Duration::from_millis(self.pause_ms),
            locator: LocatorOptions::default(),
        }
    }
}

impl Cli {
    /// The command to run; bare invocation installs.
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Install(InstallArgs::default()))
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn log_level(&self) -> tracing::Level {
        if self.is_quiet() {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
