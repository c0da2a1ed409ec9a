use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[clap(name = "imap-backup")]
#[clap(author, version, about)]
pub struct Args {
    /// Mail server hostname and port, e.g. imap.example.com:993.
    #[clap(long, env = "IMAP_SERVER")]
    pub server: String,
    /// User for the IMAP server.
    #[clap(long, env = "IMAP_USER")]
    pub user: String,
    /// Password for the IMAP server.
    #[clap(long, env = "IMAP_PASSWORD", hide_env_values = true)]
    pub password: String,
    /// Seconds to wait for the server to acknowledge logout, 0 to skip it.
    #[clap(long = "logout-timeout", value_name = "SECONDS", default_value_t = 5)]
    pub logout_timeout_secs: u64,
    /// Suppress progress bars and informational output.
    #[clap(short, long, global = true)]
    pub quiet: bool,
    /// Log more; repeat for even more.
    #[clap(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download every message into .eml files.
    Backup {
        /// Folder to back up, together with its subfolders. Empty means all.
        #[clap(long, default_value = "")]
        path: String,
        /// Directory to download into.
        #[clap(long, default_value = ".")]
        output: PathBuf,
    },
    /// Print the space used by each folder.
    Sizes {
        /// Folder to measure, together with its subfolders. Empty means all.
        #[clap(long, default_value = "")]
        path: String,
        /// List the largest folders first.
        #[clap(long)]
        sort_by_size: bool,
    },
}

impl Args {
    pub fn parse_args() -> Self {
        // Credentials may be kept in a .env file next to the backup.
        dotenv::dotenv().ok();
        Self::parse()
    }

    pub fn log_level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::Warn,
            (false, 0) => LevelFilter::Info,
            (false, 1) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        }
    }

    pub fn logout_timeout(&self) -> Duration {
        Duration::from_secs(self.logout_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["imap-backup", "--server", "h", "--user", "u", "--password", "p"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_backup_defaults() {
        let args = parse(&["backup"]);
        match &args.command {
            Command::Backup { path, output } => {
                assert_eq!(path, "");
                assert_eq!(output, &PathBuf::from("."));
            }
            _ => panic!("unexpected {:?}", args.command),
        }
        assert_eq!(args.logout_timeout(), Duration::from_secs(5));
        assert_eq!(args.log_level(), LevelFilter::Info);
    }

    #[test]
    fn test_sizes() {
        let args = parse(&["sizes", "--path", "INBOX", "--sort-by-size", "-vv"]);
        match &args.command {
            Command::Sizes { path, sort_by_size } => {
                assert_eq!(path, "INBOX");
                assert!(*sort_by_size);
            }
            _ => panic!("unexpected {:?}", args.command),
        }
        assert_eq!(args.log_level(), LevelFilter::Trace);
    }

    #[test]
    fn test_quiet_and_logout_timeout() {
        let args = parse(&["--logout-timeout", "0", "backup", "-q", "--output", "/tmp/mail"]);
        assert!(args.quiet);
        assert_eq!(args.log_level(), LevelFilter::Warn);
        assert_eq!(args.logout_timeout(), Duration::from_secs(0));
    }
}
