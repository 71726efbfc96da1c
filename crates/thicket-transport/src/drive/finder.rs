//! Locating removable drives.

use std::{
    collections::BTreeSet,
    io,
    path::PathBuf,
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Enumerates the drives currently available for writing.
#[async_trait]
pub trait DriveFinder: Send + Sync + 'static {
    /// Root directories of the mounted drives.
    async fn find_drives(&self) -> io::Result<Vec<PathBuf>>;
}

/// Reports drives as they are inserted.
///
/// `run` is spawned when the plugin starts and aborted when it stops. It
/// sends the root of each newly inserted drive on `inserted`.
#[async_trait]
pub trait DriveMonitor: Send + Sync + 'static {
    /// Watch for insertions until aborted or `inserted` closes.
    async fn run(&self, inserted: mpsc::UnboundedSender<PathBuf>) -> io::Result<()>;
}

/// Chooses the output drive when more than one is mounted.
pub trait DriveChooser: Send + Sync + 'static {
    /// Index into `drives`, or `None` to write nothing.
    fn choose_drive(&self, drives: &[PathBuf]) -> Option<usize>;
}

/// Always picks the first drive.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstDrive;

impl DriveChooser for FirstDrive {
    fn choose_drive(&self, drives: &[PathBuf]) -> Option<usize> {
        (!drives.is_empty()).then_some(0)
    }
}

/// Treats every directory directly below the given roots as a drive, the
/// way desktop systems mount media under `/media/<user>` or `/Volumes`.
#[derive(Debug, Clone)]
pub struct MountPointFinder {
    roots: Vec<PathBuf>,
}

impl MountPointFinder {
    /// Finder over the given mount roots. Missing roots are skipped.
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self { roots: roots.into_iter().collect() }
    }
}

#[async_trait]
impl DriveFinder for MountPointFinder {
    async fn find_drives(&self) -> io::Result<Vec<PathBuf>> {
        let mut drives = Vec::new();
        for root in &self.roots {
            let mut entries = match tokio::fs::read_dir(root).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            };
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    drives.push(entry.path());
                }
            }
        }
        drives.sort();
        Ok(drives)
    }
}

/// Detects insertions by asking a [`DriveFinder`] at a fixed interval.
///
/// Drives present on the first scan count as inserted.
#[derive(Debug, Clone)]
pub struct PollingDriveMonitor<F> {
    finder: F,
    interval: Duration,
}

impl<F: DriveFinder> PollingDriveMonitor<F> {
    /// Scan with `finder` every `interval`.
    pub fn new(finder: F, interval: Duration) -> Self {
        Self { finder, interval }
    }
}

#[async_trait]
impl<F: DriveFinder> DriveMonitor for PollingDriveMonitor<F> {
    async fn run(&self, inserted: mpsc::UnboundedSender<PathBuf>) -> io::Result<()> {
        let mut known = BTreeSet::new();
        loop {
            let current: BTreeSet<PathBuf> = self.finder.find_drives().await?.into_iter().collect();
            for drive in current.difference(&known) {
                if inserted.send(drive.clone()).is_err() {
                    return Ok(());
                }
            }
            known = current;
            tokio::time::sleep(self.interval).await;
        }
    }
}
