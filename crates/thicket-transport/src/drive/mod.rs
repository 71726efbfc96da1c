//! Removable drive plugin.
//!
//! A simplex transport: a stream is one file. Writers create a fresh,
//! randomly named connection file on a chosen drive; when a drive is
//! inserted, every connection file on it becomes a reader.
//!
//! ```text
//! DriveMonitor ──root──► drive_inserted ──► one SimplexReader per
//!                                            <16 hex>.dat file ──► callback
//!
//! create_writer ──► DriveFinder ──► DriveChooser ──► <random>.dat
//! ```

mod finder;

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
pub use finder::{
    DriveChooser, DriveFinder, DriveMonitor, FirstDrive, MountPointFinder, PollingDriveMonitor,
};
use thicket_core::{Environment, SystemEnv};
use thicket_crypto::TransportId;
use thicket_proto::{DEFAULT_FRAME_LENGTH, FrameConfig};
use tokio::{
    fs::{File, OpenOptions},
    sync::mpsc,
};

use crate::{
    callback::SimplexCallback,
    connection::{SimplexReader, SimplexWriter},
    control::{PluginControl, PluginSnapshot, RunId},
    error::PluginError,
    plugin::{Capabilities, Direction, Plugin, PluginState},
    properties::{ContactId, PluginConfig, RemoteProperties, TransportProperties},
};

/// Transport id of the removable drive plugin
pub const DRIVE_TRANSPORT_ID: &str = "drive";

/// Extension of connection files
pub const CONNECTION_FILE_EXTENSION: &str = "dat";

const CONNECTION_FILE_STEM_LENGTH: usize = 16;

// A drive can sit in a drawer for a while
const MAX_LATENCY: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Whether `name` looks like a connection file: 16 hex digits and `.dat`.
pub fn is_connection_filename(name: &str) -> bool {
    let Some((stem, extension)) = name.split_once('.') else {
        return false;
    };
    stem.len() == CONNECTION_FILE_STEM_LENGTH
        && stem.bytes().all(|b| b.is_ascii_hexdigit())
        && extension.eq_ignore_ascii_case(CONNECTION_FILE_EXTENSION)
}

struct Shared<F, M, E> {
    id: TransportId,
    finder: F,
    monitor: M,
    chooser: Box<dyn DriveChooser>,
    env: E,
    control: PluginControl<dyn SimplexCallback>,
}

/// Simplex plugin over removable drives.
pub struct DrivePlugin<F, M, E = SystemEnv> {
    shared: Arc<Shared<F, M, E>>,
}

impl<F: DriveFinder, M: DriveMonitor, E: Environment> DrivePlugin<F, M, E> {
    /// Plugin writing to drives from `finder` and reading drives reported
    /// by `monitor`. Uses [`FirstDrive`] when several drives are mounted.
    pub fn new(finder: F, monitor: M, env: E) -> Self {
        Self::with_chooser(finder, monitor, env, FirstDrive)
    }

    /// Plugin asking `chooser` which drive to write to.
    pub fn with_chooser(finder: F, monitor: M, env: E, chooser: impl DriveChooser) -> Self {
        let Ok(id) = TransportId::new(DRIVE_TRANSPORT_ID) else {
            unreachable!("invariant: drive transport id is within length bounds")
        };
        Self {
            shared: Arc::new(Shared {
                id,
                finder,
                monitor,
                chooser: Box::new(chooser),
                env,
                control: PluginControl::new(),
            }),
        }
    }

    /// Hand every connection file below `root` to the callback.
    ///
    /// Called by the drive monitor task; public for platforms that learn
    /// about insertions some other way. Returns the number of readers
    /// created.
    pub async fn drive_inserted(&self, root: &Path) -> usize {
        match self.shared.control.current_run() {
            Some(run) => self.shared.drive_inserted(root, run).await,
            None => 0,
        }
    }

    /// Create a fresh connection file for `contact` on the chosen drive.
    ///
    /// `None` if the plugin is not Running, no drive is mounted, the
    /// chooser declines, or the file cannot be created.
    pub async fn create_writer(&self, contact: ContactId) -> Option<SimplexWriter> {
        self.shared.create_writer(contact).await
    }

    /// The caller is done with the reader opened from `path`.
    ///
    /// A recognised file has been consumed and is deleted so it is not
    /// read again on the next insertion. An unrecognised file may belong
    /// to someone else and stays. The callback is told either way.
    pub async fn reader_finished(&self, path: &Path, recognised: bool) {
        if recognised && let Err(err) = tokio::fs::remove_file(path).await {
            tracing::warn!(transport = %self.shared.id, path = %path.display(), error = %err, "cannot remove consumed file");
        }
        if let Some(callback) = self.shared.live_callback() {
            callback.reader_finished(path, recognised);
        }
    }

    /// The caller finished writing the connection file at `path`.
    pub fn writer_finished(&self, path: &Path) {
        if let Some(callback) = self.shared.live_callback() {
            callback.writer_finished(path);
        }
    }
}

impl<F: DriveFinder, M: DriveMonitor, E: Environment> Shared<F, M, E> {
    fn frame_config() -> FrameConfig {
        FrameConfig { max_frame_length: DEFAULT_FRAME_LENGTH }
    }

    fn live_callback(&self) -> Option<Arc<dyn SimplexCallback>> {
        self.control.live_callback(self.control.current_run()?)
    }

    async fn watch(self: Arc<Self>, run: RunId) {
        let (sender, mut inserted) = mpsc::unbounded_channel();
        let monitor = async {
            if let Err(err) = self.monitor.run(sender).await {
                tracing::warn!(transport = %self.id, error = %err, "drive monitor failed");
            }
        };
        let readers = async {
            while let Some(root) = inserted.recv().await {
                self.drive_inserted(&root, run).await;
            }
        };
        tokio::join!(monitor, readers);
    }

    async fn drive_inserted(&self, root: &Path, run: RunId) -> usize {
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(transport = %self.id, root = %root.display(), error = %err, "cannot list drive");
                return 0;
            },
        };

        let mut created = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(transport = %self.id, root = %root.display(), error = %err, "cannot list drive");
                    break;
                },
            };

            let name = entry.file_name();
            if !name.to_str().is_some_and(is_connection_filename) {
                continue;
            }
            if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            let file = match File::open(&path).await {
                Ok(file) => file,
                Err(err) => {
                    tracing::warn!(transport = %self.id, path = %path.display(), error = %err, "cannot open connection file");
                    continue;
                },
            };

            let Some(callback) = self.control.live_callback(run) else {
                break;
            };
            tracing::debug!(transport = %self.id, path = %path.display(), "connection file found");
            callback.reader_created(SimplexReader::new(path, file, Self::frame_config()));
            created += 1;
        }
        created
    }

    async fn choose_drive(&self) -> Option<PathBuf> {
        let mut drives = match self.finder.find_drives().await {
            Ok(drives) => drives,
            Err(err) => {
                tracing::warn!(transport = %self.id, error = %err, "cannot find drives");
                return None;
            },
        };

        let index = match drives.len() {
            0 => {
                tracing::debug!(transport = %self.id, "no drive mounted");
                return None;
            },
            1 => 0,
            _ => self.chooser.choose_drive(&drives)?,
        };
        if index >= drives.len() {
            tracing::warn!(transport = %self.id, index, "chooser picked a missing drive");
            return None;
        }
        Some(drives.swap_remove(index))
    }

    async fn create_writer(&self, contact: ContactId) -> Option<SimplexWriter> {
        let run = self.control.running("create_writer").ok()?;
        let drive = self.choose_drive().await?;
        let path = drive.join(format!("{:016x}.{CONNECTION_FILE_EXTENSION}", self.env.random_u64()));

        let file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(transport = %self.id, path = %path.display(), error = %err, "cannot create connection file");
                return None;
            },
        };

        if !self.control.is_current(run) {
            drop(file);
            if let Err(err) = tokio::fs::remove_file(&path).await {
                tracing::debug!(path = %path.display(), error = %err, "cannot remove abandoned file");
            }
            return None;
        }
        tracing::debug!(transport = %self.id, contact = %contact, path = %path.display(), "connection file created");
        Some(SimplexWriter::new(path, contact, file, Self::frame_config()))
    }
}

#[async_trait]
impl<F: DriveFinder, M: DriveMonitor, E: Environment> Plugin for DrivePlugin<F, M, E> {
    type Callback = dyn SimplexCallback;

    fn id(&self) -> &TransportId {
        &self.shared.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            direction: Direction::Simplex,
            polling_interval: None,
            max_frame_length: DEFAULT_FRAME_LENGTH,
            max_latency: MAX_LATENCY,
        }
    }

    fn state(&self) -> PluginState {
        self.shared.control.state()
    }

    async fn start(
        &self,
        local: TransportProperties,
        remote: RemoteProperties,
        config: PluginConfig,
        callback: Arc<dyn SimplexCallback>,
    ) -> Result<(), PluginError> {
        let run =
            self.shared.control.begin_start(PluginSnapshot { local, remote, config }, callback)?;
        let watcher = tokio::spawn(Arc::clone(&self.shared).watch(run));
        self.shared.control.finish_start(Some(watcher));

        tracing::debug!(transport = %self.id(), "plugin started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        if let Some(watcher) = self.shared.control.begin_stop()? {
            watcher.abort();
            if let Err(err) = watcher.await
                && err.is_panic()
            {
                tracing::warn!(transport = %self.id(), error = %err, "drive monitor panicked");
            }
        }
        self.shared.control.finish_stop();

        tracing::debug!(transport = %self.id(), "plugin stopped");
        Ok(())
    }

    fn set_local_properties(&self, local: TransportProperties) -> Result<(), PluginError> {
        self.shared.control.update("set_local_properties", |snapshot| snapshot.local = local)
    }

    fn set_remote_properties(
        &self,
        contact: ContactId,
        remote: TransportProperties,
    ) -> Result<(), PluginError> {
        self.shared.control.update("set_remote_properties", |snapshot| {
            snapshot.remote.insert(contact, remote);
        })
    }

    fn set_config(&self, config: PluginConfig) -> Result<(), PluginError> {
        self.shared.control.update("set_config", |snapshot| snapshot.config = config)
    }

    async fn poll(&self, _connected: &BTreeSet<ContactId>) -> Result<usize, PluginError> {
        Err(PluginError::PollingUnsupported { transport_id: self.shared.id.clone() })
    }
}
