//! Background loading of model files.
//!
//! Each load runs on its own worker thread and reports back through a
//! channel: zero or more [`AssetStatus::Progress`] events followed by exactly
//! one [`AssetStatus::Loaded`] or [`AssetStatus::Failed`]. The frame loop
//! drains the channel with [`AssetLoader::poll`] and never blocks on it.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::debug;

use crate::error::AssetError;
use crate::mesh::MeshData;
use crate::obj::parse_obj;

const CHUNK_SIZE: usize = 64 * 1024;

/// Outcome reported by a loader worker.
#[derive(Debug)]
pub enum AssetStatus {
    /// Fraction of the file read so far, in `0.0..=1.0`.
    Progress(f32),
    Loaded(MeshData),
    Failed(AssetError),
}

#[derive(Debug)]
pub struct AssetEvent {
    /// Name the load was requested under.
    pub name: String,
    pub status: AssetStatus,
}

/// Spawns model loads and collects their events.
#[derive(Debug)]
pub struct AssetLoader {
    root: PathBuf,
    sender: Sender<AssetEvent>,
    receiver: Receiver<AssetEvent>,
}

impl AssetLoader {
    /// Creates a loader resolving relative paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            root: root.into(),
            sender,
            receiver,
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Starts loading the model at `path`; events are tagged with `name`.
    pub fn load(&self, name: impl Into<String>, path: &str) {
        let name = name.into();
        let path = self.resolve(path);
        let sender = self.sender.clone();
        let worker_name = name.clone();
        let worker_sender = self.sender.clone();

        let spawned = thread::Builder::new()
            .name(format!("asset-{name}"))
            .spawn(move || load_worker(&worker_name, &path, &worker_sender));

        if let Err(source) = spawned {
            let _ = sender.send(AssetEvent {
                name,
                status: AssetStatus::Failed(AssetError::Io {
                    path: PathBuf::from("<worker thread>"),
                    source,
                }),
            });
        }
    }

    /// Drains every event reported since the last call without blocking.
    pub fn poll(&self) -> Vec<AssetEvent> {
        self.receiver.try_iter().collect()
    }

    /// Waits up to `timeout` for the next event.
    pub fn wait(&self, timeout: Duration) -> Option<AssetEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

fn load_worker(name: &str, path: &Path, sender: &Sender<AssetEvent>) {
    let send = |status: AssetStatus| {
        // the receiving side only disappears when the scene is torn down
        let _ = sender.send(AssetEvent {
            name: name.to_string(),
            status,
        });
    };

    let status = match read_with_progress(path, |fraction| send(AssetStatus::Progress(fraction))) {
        Ok(bytes) => decode(path, bytes),
        Err(err) => AssetStatus::Failed(err),
    };
    debug!("asset {name} finished loading from {}", path.display());
    send(status);
}

fn read_with_progress(path: &Path, mut progress: impl FnMut(f32)) -> Result<Vec<u8>, AssetError> {
    let io_error = |source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_error)?;
    let total = file.metadata().map_err(io_error)?.len() as usize;

    let mut bytes = Vec::with_capacity(total);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut chunk).map_err(io_error)?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..read]);
        progress(fraction(bytes.len(), total));
    }
    if bytes.is_empty() {
        progress(1.0);
    }
    Ok(bytes)
}

fn fraction(read: usize, total: usize) -> f32 {
    if total == 0 {
        1.0
    } else {
        (read as f32 / total as f32).min(1.0)
    }
}

fn decode(path: &Path, bytes: Vec<u8>) -> AssetStatus {
    let Ok(text) = String::from_utf8(bytes) else {
        return AssetStatus::Failed(AssetError::Encoding {
            path: path.to_path_buf(),
        });
    };
    match parse_obj(&text) {
        Ok(mesh) => AssetStatus::Loaded(mesh),
        Err(err) => AssetStatus::Failed(AssetError::Parse {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        }),
    }
}
