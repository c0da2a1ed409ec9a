mod args;
mod downloader;
mod filename;
mod humanize;
mod report;
mod session;
mod stream;
mod utils;

use anyhow::Result;
use args::{Args, Command};
use downloader::{Downloader, LogoutOutcome};
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use log::{info, warn};
use session::MailSession;
use std::io;
use std::process;

fn main() {
    let args = Args::parse_args();
    let progress = utils::create_multi_progress(args.quiet);
    setup_logging(&args, &progress);
    if let Err(err) = do_main(&args, progress) {
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }
}

fn setup_logging(args: &Args, progress: &MultiProgress) {
    let logger = env_logger::Builder::new()
        .filter_level(args.log_level())
        .format_target(false)
        .format_timestamp_secs()
        .parse_default_env()
        .build();
    let level = logger.filter();
    if LogWrapper::new(progress.clone(), logger).try_init().is_ok() {
        log::set_max_level(level);
    }
}

fn do_main(args: &Args, progress: MultiProgress) -> Result<()> {
    let session = session::connect(&args.server, &args.user, &args.password)?;
    let mut downloader = Downloader::new(session, progress);
    let result = run(args, &mut downloader);

    match downloader.logout(args.logout_timeout()) {
        Ok(LogoutOutcome::LoggedOut) => info!("Logged out"),
        Ok(LogoutOutcome::Skipped) => {}
        Ok(LogoutOutcome::TimedOut) => warn!("Server did not answer logout, disconnecting"),
        Err(err) => warn!("{:#}", err),
    }

    result
}

fn run<S: MailSession>(args: &Args, downloader: &mut Downloader<S>) -> Result<()> {
    match &args.command {
        Command::Backup { path, output } => {
            let folders = downloader.list_folders(path)?;
            info!("Backing up {} folders", folders.len());
            downloader.download(&folders, output)?;
        }
        Command::Sizes { path, sort_by_size } => {
            let folders = downloader.list_folders(path)?;
            let sizes = downloader.sizes(&folders)?;
            report::write_report(&mut io::stdout().lock(), &sizes, *sort_by_size)?;
        }
    }
    info!("Done!");
    Ok(())
}
