//! Main entry point for the sfxzip CLI application.
//!
//! Without a subcommand the binary behaves as an installer: it finds the
//! payload appended to itself and unpacks it.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;

use sfxzip::cli::{Cli, Command};
use sfxzip::{
    ContainerReader, InstallListener, Installer, LocatorOptions, TempWorkspace, append_archive,
    copy_range, installer::describe, locate, validate,
};

/// Prints installer callbacks to stderr.
struct ConsoleListener {
    quiet: bool,
}

impl InstallListener for ConsoleListener {
    fn on_progress(&self, percentage: u8, message: &str) {
        if !self.quiet {
            eprintln!("[{:>3}%] {}", percentage, message);
        }
    }

    fn on_finished(&self, success: bool, message: &str) {
        if success && !self.quiet {
            eprintln!("{}", message);
        }
    }

    fn on_error(&self, message: &str) {
        eprintln!("error: {}", message);
    }
}

/// Application entry point.
///
/// The runtime is single-threaded: the installer's progress reports yield
/// to it cooperatively.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command() {
        Command::Install(args) => {
            let listener = ConsoleListener {
                quiet: cli.is_quiet(),
            };
            let installer = Installer::new(args.to_options(), &listener);
            match installer.run().await {
                Ok(report) => {
                    if !cli.is_very_quiet() {
                        println!(
                            "Installed {} files into {}",
                            report.outcome.files_written,
                            report.target_dir.display()
                        );
                    }
                    Ok(ExitCode::SUCCESS)
                }
                // The listener already reported the failure
                Err(_) => Ok(ExitCode::FAILURE),
            }
        }
        Command::Locate { host, window } => {
            let mut options = LocatorOptions::default();
            if let Some(window) = window {
                options.directory_window = window;
            }
            let location = locate::locate_with(&host, options).await?;
            println!("found by: {}", location.tier);
            println!("offset:   {}", location.offset);
            println!(
                "size:     {} ({})",
                location.size,
                format_size(location.size)
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { zip } => match validate::check(&zip).await {
            Ok(()) => {
                if !cli.is_quiet() {
                    println!("{}: OK", zip.display());
                }
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                eprintln!("{}: {}", zip.display(), describe(&e));
                Ok(ExitCode::FAILURE)
            }
        },
        Command::List { host } => {
            list_payload(&host).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Append {
            exe,
            zip,
            output,
            no_footer,
        } => {
            let output = output.unwrap_or_else(|| exe.clone());
            let report = append_archive(&exe, &zip, &output, !no_footer)
                .await
                .with_context(|| {
                    format!("failed to append {} to {}", zip.display(), exe.display())
                })?;
            if !cli.is_quiet() {
                println!(
                    "Appended {} ({}) to {} at offset {}{}",
                    zip.display(),
                    format_size(report.archive_size),
                    report.output.display(),
                    report.archive_offset,
                    if report.footer.is_some() {
                        ", footer written"
                    } else {
                        ""
                    }
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Locate the payload, copy it to scratch storage and print its entries.
///
/// Uses the same table layout as `unzip -v`.
async fn list_payload(host: &Path) -> Result<()> {
    let location = locate::locate(host).await?;
    let workspace = TempWorkspace::acquire()?;
    copy_range(host, location.offset, location.size, workspace.archive_path())
        .await
        .context("payload failed its integrity checks")?;

    let reader = ContainerReader::open(workspace.archive_path())?;
    let entries = reader.list_entries().await?;

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );
    Ok(())
}

/// Compression ratio as percentage saved.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
