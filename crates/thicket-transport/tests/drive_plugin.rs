//! Removable drive plugin against a temporary mount directory.

use std::{
    collections::BTreeSet,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use thicket_core::{KeyEvent, SystemEnv, Transaction, TransportKeyManager};
use thicket_crypto::{Role, RotationPeriod, SecretKey, TransportId};
use thicket_transport::{
    ChannelSimplexCallback, ContactId, DrivePlugin, Plugin, PluginConfig, PluginError,
    PluginState, RemoteProperties, SimplexCallback, SimplexReader, TransportProperties,
    drive::{DriveChooser, DriveMonitor, MountPointFinder},
    is_connection_filename,
};
use tokio::{sync::mpsc, time::timeout};

const ALICE: ContactId = ContactId::new(1);
const BOB: ContactId = ContactId::new(2);

/// Reports a fixed set of drives once, then waits to be aborted.
struct InsertOnce(Vec<PathBuf>);

#[async_trait]
impl DriveMonitor for InsertOnce {
    async fn run(&self, inserted: mpsc::UnboundedSender<PathBuf>) -> io::Result<()> {
        for root in &self.0 {
            let _ = inserted.send(root.clone());
        }
        std::future::pending::<()>().await;
        Ok(())
    }
}

struct Decline;

impl DriveChooser for Decline {
    fn choose_drive(&self, _drives: &[PathBuf]) -> Option<usize> {
        None
    }
}

struct Mount {
    dir: tempfile::TempDir,
}

impl Mount {
    fn new(drives: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for drive in drives {
            std::fs::create_dir(dir.path().join(drive)).unwrap();
        }
        Self { dir }
    }

    fn drive(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn finder(&self) -> MountPointFinder {
        MountPointFinder::new([self.dir.path().to_path_buf()])
    }
}

/// Records what the plugin reports as finished.
#[derive(Default)]
struct Finished {
    readers: Mutex<Vec<(PathBuf, bool)>>,
    writers: Mutex<Vec<PathBuf>>,
}

impl SimplexCallback for Finished {
    fn reader_created(&self, _reader: SimplexReader) {}

    fn reader_finished(&self, path: &Path, recognised: bool) {
        self.readers.lock().unwrap().push((path.to_path_buf(), recognised));
    }

    fn writer_finished(&self, path: &Path) {
        self.writers.lock().unwrap().push(path.to_path_buf());
    }
}

type TestPlugin = DrivePlugin<MountPointFinder, InsertOnce>;

async fn start(plugin: &TestPlugin) -> mpsc::UnboundedReceiver<SimplexReader> {
    let (callback, readers) = ChannelSimplexCallback::channel();
    plugin
        .start(TransportProperties::new(), RemoteProperties::new(), PluginConfig::new(), Arc::new(callback))
        .await
        .unwrap();
    readers
}

fn key_manager(contact: ContactId, role: Role) -> TransportKeyManager {
    let mut manager = TransportKeyManager::new(TransportId::new("drive").unwrap());
    let mut txn: Transaction<(), KeyEvent> = Transaction::new((), false);
    manager
        .add_contact(&mut txn, contact, &SecretKey::new([0x24; 32]), RotationPeriod::new(3), role)
        .unwrap();
    manager
}

#[tokio::test]
async fn written_file_is_read_back_on_insertion() {
    let mount = Mount::new(&["usb"]);
    let drive = mount.drive("usb");

    // Alice writes a connection file for Bob
    let writer_plugin = DrivePlugin::new(mount.finder(), InsertOnce(Vec::new()), SystemEnv::new());
    let _ignored = start(&writer_plugin).await;
    let file = writer_plugin.create_writer(BOB).await.unwrap();
    assert_eq!(file.path().parent(), Some(drive.as_path()));
    assert!(is_connection_filename(file.path().file_name().unwrap().to_str().unwrap()));
    assert_eq!(file.contact(), BOB);

    let mut alice_keys = key_manager(BOB, Role::Initiator);
    let stream = alice_keys.next_outgoing_stream(BOB).unwrap();
    let mut writer = file.into_writer(&stream).unwrap();
    writer.write_message(b"sneakernet").await.unwrap();
    writer.finish().await.unwrap();
    writer_plugin.stop().await.unwrap();

    // Noise that must not become readers
    std::fs::write(drive.join("notes.txt"), b"shopping list").unwrap();
    std::fs::create_dir(drive.join("aaaaaaaaaaaaaaaa.dat")).unwrap();

    // Bob inserts the drive
    let reader_plugin = DrivePlugin::new(mount.finder(), InsertOnce(vec![drive]), SystemEnv::new());
    let mut readers = start(&reader_plugin).await;
    let mut reader = timeout(Duration::from_secs(5), readers.recv()).await.unwrap().unwrap();

    let mut bob_keys = key_manager(ALICE, Role::Responder);
    let tag = reader.read_tag().await.unwrap();
    let incoming = bob_keys.recognise(&tag).unwrap();
    assert_eq!(incoming.contact(), ALICE);

    let mut stream = reader.into_reader(&incoming).unwrap();
    assert_eq!(stream.read_message().await.unwrap().unwrap().as_ref(), b"sneakernet");
    assert!(stream.read_message().await.unwrap().is_none());

    assert!(readers.try_recv().is_err(), "only the connection file is a reader");
    reader_plugin.stop().await.unwrap();
}

#[tokio::test]
async fn drive_inserted_counts_connection_files() {
    let mount = Mount::new(&["usb"]);
    let drive = mount.drive("usb");
    std::fs::write(drive.join("0123456789abcdef.dat"), b"").unwrap();
    std::fs::write(drive.join("fedcba9876543210.dat"), b"").unwrap();
    std::fs::write(drive.join("readme.dat"), b"").unwrap();

    let plugin = DrivePlugin::new(mount.finder(), InsertOnce(Vec::new()), SystemEnv::new());
    assert_eq!(plugin.drive_inserted(&drive).await, 0, "not running");

    let _readers = start(&plugin).await;
    assert_eq!(plugin.drive_inserted(&drive).await, 2);
    assert_eq!(plugin.drive_inserted(&mount.drive("missing")).await, 0);
    plugin.stop().await.unwrap();
}

#[tokio::test]
async fn no_writer_without_a_drive() {
    let mount = Mount::new(&[]);
    let plugin = DrivePlugin::new(mount.finder(), InsertOnce(Vec::new()), SystemEnv::new());
    assert!(plugin.create_writer(BOB).await.is_none(), "not running");

    let _readers = start(&plugin).await;
    assert!(plugin.create_writer(BOB).await.is_none());
    plugin.stop().await.unwrap();
}

#[tokio::test]
async fn chooser_can_decline() {
    let mount = Mount::new(&["usb-a", "usb-b"]);
    let plugin = DrivePlugin::with_chooser(
        mount.finder(),
        InsertOnce(Vec::new()),
        SystemEnv::new(),
        Decline,
    );
    let _readers = start(&plugin).await;
    assert!(plugin.create_writer(BOB).await.is_none());
    plugin.stop().await.unwrap();
}

#[tokio::test]
async fn polling_is_unsupported() {
    let mount = Mount::new(&[]);
    let plugin = DrivePlugin::new(mount.finder(), InsertOnce(Vec::new()), SystemEnv::new());
    assert!(!plugin.capabilities().supports_polling());

    let _readers = start(&plugin).await;
    let err = plugin.poll(&BTreeSet::new()).await.unwrap_err();
    assert!(matches!(err, PluginError::PollingUnsupported { .. }));
    assert!(err.is_contract_violation());

    plugin.stop().await.unwrap();
    assert_eq!(plugin.state(), PluginState::Stopped);
    assert!(plugin.stop().await.is_err());
}

#[tokio::test]
async fn finished_files_are_reported_and_consumed_ones_removed() {
    let mount = Mount::new(&["usb"]);
    let drive = mount.drive("usb");
    let consumed = drive.join("0123456789abcdef.dat");
    let foreign = drive.join("fedcba9876543210.dat");
    std::fs::write(&consumed, b"").unwrap();
    std::fs::write(&foreign, b"").unwrap();

    let plugin = DrivePlugin::new(mount.finder(), InsertOnce(Vec::new()), SystemEnv::new());
    let finished = Arc::new(Finished::default());
    plugin
        .start(
            TransportProperties::new(),
            RemoteProperties::new(),
            PluginConfig::new(),
            Arc::clone(&finished) as Arc<dyn SimplexCallback>,
        )
        .await
        .unwrap();

    plugin.reader_finished(&consumed, true).await;
    plugin.reader_finished(&foreign, false).await;
    assert!(!consumed.exists());
    assert!(foreign.exists(), "unrecognised files are left for their owner");

    let file = plugin.create_writer(BOB).await.unwrap();
    let written = file.path().to_path_buf();
    drop(file);
    plugin.writer_finished(&written);

    assert_eq!(
        *finished.readers.lock().unwrap(),
        vec![(consumed.clone(), true), (foreign.clone(), false)]
    );
    assert_eq!(*finished.writers.lock().unwrap(), vec![written.clone()]);

    // Nothing reaches a stopped plugin's callback
    plugin.stop().await.unwrap();
    plugin.writer_finished(&written);
    assert_eq!(finished.writers.lock().unwrap().len(), 1);
}
