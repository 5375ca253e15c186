//! # sfxzip
//!
//! Engine of a self-extracting installer: an executable that carries a ZIP
//! container appended to itself and unpacks it onto the target machine.
//!
//! An installation attempt runs these steps in order:
//!
//! - [`locate`]: find the container's byte range in the host executable
//!   (metadata footer, then End of Central Directory scan, then signature scan)
//! - [`payload`]: copy that range into a scratch workspace in bounded chunks
//! - [`validate`]: check the copy's structure before trusting it
//! - [`unpack`]: extract every entry with byte-exact size verification
//!
//! [`installer`] strings them together, reporting through an
//! [`InstallListener`], and [`append`] builds such installers.
//!
//! ## Example
//!
//! ```no_run
//! use sfxzip::{InstallOptions, SilentListener, install};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> sfxzip::Result<()> {
//!     let options = InstallOptions {
//!         target_dir: "C:/Program Files/Ausic".into(),
//!         ..Default::default()
//!     };
//!     let report = install(options, &SilentListener).await?;
//!     println!("{} files installed", report.outcome.files_written);
//!     Ok(())
//! }
//! ```

pub mod append;
pub mod cli;
pub mod error;
pub mod installer;
pub mod io;
pub mod locate;
pub mod payload;
pub mod progress;
pub mod unpack;
pub mod validate;
pub mod workspace;
pub mod zip;

pub use append::{AppendReport, append_archive};
pub use cli::Cli;
pub use error::{Error, Phase, Result};
pub use installer::{InstallOptions, InstallReport, Installer, install};
pub use io::{LocalFileReader, ReadAt};
pub use locate::{ArchiveLocation, ArchiveLocator, LocateTier, LocatorOptions, locate};
pub use payload::copy_range;
pub use progress::{InstallListener, ProgressReporter, SilentListener};
pub use unpack::{ExtractionOutcome, extract};
pub use workspace::TempWorkspace;
pub use zip::{ContainerEntry, ContainerReader};
