use crate::filename::generate_file_name;
use crate::report::FolderSizes;
use crate::session::{FetchQuery, FetchedMessage, FolderInfo, MailSession, SequenceRange};
use crate::stream;
use crate::utils;
use anyhow::{anyhow, bail, Context, Result};
use indicatif::MultiProgress;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// How a logout attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogoutOutcome {
    LoggedOut,
    /// Logout was disabled with a zero timeout.
    Skipped,
    /// The server did not answer in time and the connection was abandoned.
    TimedOut,
}

pub struct Downloader<S> {
    session: S,
    progress: MultiProgress,
}

/// Maps a folder onto a directory below `output`. Components that would
/// step outside of `output` are dropped.
fn folder_dir(output: &Path, folder: &str) -> PathBuf {
    let mut dir = output.to_path_buf();
    dir.extend(
        folder
            .split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != ".."),
    );
    dir
}

impl<S: MailSession> Downloader<S> {
    pub fn new(session: S, progress: MultiProgress) -> Self {
        Downloader { session, progress }
    }

    fn list(&mut self, pattern: &str) -> Result<Vec<FolderInfo>> {
        let mut listed = vec![];
        let session = &mut self.session;
        stream::drain(
            move |tx| session.list("", pattern, tx),
            |folder: FolderInfo| {
                listed.push(folder);
                Ok(())
            },
        )
        .with_context(|| format!("failed to list folders matching {:?}", pattern))?;
        Ok(listed)
    }

    /// Lists every selectable folder at or below `path`, or all of them
    /// when `path` is empty, in the order the server returns them. `path`
    /// itself comes first unless it is `\Noselect`.
    pub fn list_folders(&mut self, path: &str) -> Result<Vec<String>> {
        let listed = if path.is_empty() {
            self.list("*")?
        } else {
            // Servers may glue reference and pattern together without a
            // separator, so the subtree is matched through the delimiter.
            let mut listed = self.list(path)?;
            if listed.is_empty() {
                bail!("no folder named {:?}", path);
            }
            let delimiter = listed.iter().find_map(|folder| folder.delimiter.clone());
            if let Some(delimiter) = delimiter {
                listed.extend(self.list(&format!("{}{}*", path, delimiter))?);
            }
            listed
        };

        let mut folders: Vec<String> = vec![];
        for folder in listed {
            if !folder.selectable {
                debug!("Skipping non-selectable folder {}", folder.path);
            } else if !folders.contains(&folder.path) {
                debug!("Found folder {}", folder.path);
                folders.push(folder.path);
            }
        }
        Ok(folders)
    }

    fn select(&mut self, folder: &str) -> Result<Option<SequenceRange>> {
        let count = self
            .session
            .select(folder)
            .with_context(|| format!("failed to select folder {:?}", folder))?;
        Ok(SequenceRange::all(count))
    }

    /// Adds up the size of all messages in each folder.
    pub fn sizes(&mut self, paths: &[String]) -> Result<FolderSizes> {
        let mut sizes = FolderSizes::new();
        for path in paths {
            let mut total = 0u64;
            if let Some(range) = self.select(path)? {
                let session = &mut self.session;
                utils::with_progress_bar(&self.progress, path, range.len(), |bar| {
                    stream::drain(
                        move |tx| session.fetch(range, FetchQuery::Fast, tx),
                        |message: FetchedMessage| {
                            total += u64::from(message.size.unwrap_or(0));
                            bar.inc(1);
                            Ok(())
                        },
                    )
                })
                .with_context(|| format!("failed to measure folder {:?}", path))?;
            }
            debug!("{} holds {} bytes", path, total);
            sizes.insert(path, total);
        }
        Ok(sizes)
    }

    /// Writes every message of each folder to `output/<folder>/<name>.eml`.
    ///
    /// Existing files with the same name are overwritten.
    pub fn download(&mut self, paths: &[String], output: &Path) -> Result<()> {
        for path in paths {
            let dir = folder_dir(output, path);
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;

            let range = match self.select(path)? {
                Some(range) => range,
                None => {
                    info!("{} is empty", path);
                    continue;
                }
            };
            info!("Downloading {} messages from {}", range.len(), path);

            let session = &mut self.session;
            utils::with_progress_bar(&self.progress, path, range.len(), |bar| {
                stream::drain(
                    move |tx| session.fetch(range, FetchQuery::Full, tx),
                    |message: FetchedMessage| {
                        let file = dir.join(generate_file_name(&message));
                        fs::write(&file, message.body.concat())
                            .with_context(|| format!("failed to write {}", file.display()))?;
                        debug!("Downloaded {}", file.display());
                        bar.inc(1);
                        Ok(())
                    },
                )
            })
            .with_context(|| format!("failed to download folder {:?}", path))?;
        }
        Ok(())
    }
}

impl<S: MailSession + 'static> Downloader<S> {
    /// Logs out, giving up after `timeout`. Some servers never answer a
    /// LOGOUT, so the session is handed to a helper thread which is left
    /// behind if it does not finish in time. A zero timeout skips the logout.
    pub fn logout(self, timeout: Duration) -> Result<LogoutOutcome> {
        if timeout == Duration::from_secs(0) {
            return Ok(LogoutOutcome::Skipped);
        }
        let mut session = self.session;
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(session.logout());
        });
        match rx.recv_timeout(timeout) {
            Ok(result) => result.map(|()| LogoutOutcome::LoggedOut),
            Err(RecvTimeoutError::Timeout) => Ok(LogoutOutcome::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("logout thread panicked")),
        }
    }
}
