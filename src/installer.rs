//! The installation pipeline: locate, copy, validate, unpack, clean up.

use std::any::Any;
use std::error::Error as _;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;

use futures::FutureExt;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::locate::{ArchiveLocation, LocatorOptions, locate_with};
use crate::payload::copy_range;
use crate::progress::{InstallListener, ProgressReporter};
use crate::unpack::{ExtractionOutcome, extract_with};
use crate::workspace::TempWorkspace;

/// Directory name used when no installation directory is given.
pub const DEFAULT_INSTALL_DIR: &str = "Ausic";

#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Executable carrying the payload; the running executable when `None`.
    pub host_path: Option<PathBuf>,
    pub target_dir: PathBuf,
    /// Parent of the scratch workspace; the platform temp location when `None`.
    pub scratch_parent: Option<PathBuf>,
    /// Wait before the first step so a UI can render.
    pub start_delay: Duration,
    /// Pause after each progress report.
    pub progress_pause: Duration,
    pub locator: LocatorOptions,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            host_path: None,
            target_dir: default_install_dir(),
            scratch_parent: None,
            start_delay: Duration::from_millis(100),
            progress_pause: Duration::from_millis(100),
            locator: LocatorOptions::default(),
        }
    }
}

/// `<current dir>/Ausic`, or a relative `Ausic` if the current directory
/// is unavailable.
pub fn default_install_dir() -> PathBuf {
    std::env::current_dir()
        .map(|dir| dir.join(DEFAULT_INSTALL_DIR))
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_INSTALL_DIR))
}

/// What a successful installation did.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub host_path: PathBuf,
    pub location: ArchiveLocation,
    pub target_dir: PathBuf,
    pub outcome: ExtractionOutcome,
}

pub struct Installer<'a> {
    options: InstallOptions,
    listener: &'a dyn InstallListener,
}

impl<'a> Installer<'a> {
    pub fn new(options: InstallOptions, listener: &'a dyn InstallListener) -> Self {
        Self { options, listener }
    }

    /// Run the whole pipeline once.
    ///
    /// Success ends with one `on_finished(true, ..)`. Any failure, a panic
    /// included, produces exactly one `on_error` naming the failing step,
    /// then `on_finished(false, ..)`. The scratch workspace is gone either way.
    pub async fn run(&self) -> Result<InstallReport> {
        tokio::time::sleep(self.options.start_delay).await;

        let reporter = ProgressReporter::new(self.listener, self.options.progress_pause);
        let outcome = AssertUnwindSafe(self.pipeline(&reporter))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(Error::Unexpected(panic_message(payload.as_ref()))));

        match outcome {
            Ok(report) => {
                self.listener
                    .on_finished(true, "Installation completed successfully");
                Ok(report)
            }
            Err(err) => {
                let message = format!("{} step failed: {}", err.phase(), describe(&err));
                warn!("{} (last progress {}%)", message, reporter.current());
                self.listener.on_error(&message);
                self.listener.on_finished(false, &message);
                Err(err)
            }
        }
    }

    async fn pipeline(&self, reporter: &ProgressReporter<'_>) -> Result<InstallReport> {
        reporter.report(0, "Starting installation...").await;

        let host_path = match &self.options.host_path {
            Some(path) => path.clone(),
            None => std::env::current_exe().map_err(|e| {
                Error::Unexpected(format!("cannot determine installer path: {}", e))
            })?,
        };
        info!("installing from {}", host_path.display());

        reporter
            .report(10, "Extracting files from the installer...")
            .await;
        let location = locate_with(&host_path, self.options.locator.clone()).await?;

        let mut workspace = match &self.options.scratch_parent {
            Some(parent) => TempWorkspace::acquire_in(parent),
            None => TempWorkspace::acquire(),
        }?;

        copy_range(
            &host_path,
            location.offset,
            location.size,
            workspace.archive_path(),
        )
        .await?;
        reporter.report(30, "Archive extracted").await;

        let target_dir = &self.options.target_dir;
        reporter
            .report(40, "Creating installation directory...")
            .await;
        fs::create_dir_all(target_dir).await.map_err(|e| {
            Error::extraction(target_dir, format!("cannot create directory: {}", e))
        })?;
        reporter.report(50, "Installation directory created").await;

        reporter.report(60, "Unpacking files...").await;
        let outcome = extract_with(workspace.archive_path(), target_dir, |index, total, entry| {
            debug!("[{}/{}] {}", index + 1, total, entry.file_name);
        })
        .await?;
        reporter.report(90, "Files unpacked").await;

        reporter
            .report(95, "Cleaning up temporary files...")
            .await;
        if let Err(e) = workspace.release() {
            warn!("scratch cleanup incomplete: {}", e);
        }

        reporter.report(100, "Installation complete").await;

        Ok(InstallReport {
            host_path,
            location,
            target_dir: target_dir.clone(),
            outcome,
        })
    }
}

/// Install with `options`, reporting to `listener`.
pub async fn install(
    options: InstallOptions,
    listener: &dyn InstallListener,
) -> Result<InstallReport> {
    Installer::new(options, listener).run().await
}

/// Error message including its sources.
pub fn describe(err: &Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str));
    match detail {
        Some(detail) => format!("installer panicked: {}", detail),
        None => "installer panicked".to_string(),
    }
}
