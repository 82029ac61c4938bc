//! Whether the model file is on disk, and which activation waits for it.
//!
//! The host downloads the model in the background. An activation granted
//! before the file is there is parked until the download settles; a failed
//! download leaves the file missing, so the next grant starts a new one.

use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFile {
    Missing,
    Downloading,
    Ready,
}

/// What the host must do after camera access was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantAction {
    /// The model is on disk; start this activation now.
    Activate(u64),
    /// Parked behind the download already running.
    Wait,
    /// Parked; no download is running, so start one.
    StartDownload,
}

/// Tracks the model file and the one activation parked behind it.
#[derive(Debug, Clone)]
pub struct DownloadGate {
    file: ModelFile,
    parked: Option<u64>,
}

impl DownloadGate {
    pub fn new(on_disk: bool) -> Self {
        Self {
            file: if on_disk { ModelFile::Ready } else { ModelFile::Missing },
            parked: None,
        }
    }

    pub fn file(&self) -> ModelFile {
        self.file
    }

    pub fn is_ready(&self) -> bool {
        self.file == ModelFile::Ready
    }

    pub fn is_downloading(&self) -> bool {
        self.file == ModelFile::Downloading
    }

    pub fn parked(&self) -> Option<u64> {
        self.parked
    }

    /// Mark a download as started. Returns `false` if one is already running
    /// or the file is there.
    pub fn begin_download(&mut self) -> bool {
        if self.file != ModelFile::Missing {
            return false;
        }
        self.file = ModelFile::Downloading;
        true
    }

    /// Decide what to do with the activation for `generation`. A newer grant
    /// replaces any activation parked before it.
    pub fn on_granted(&mut self, generation: u64) -> GrantAction {
        match self.file {
            ModelFile::Ready => GrantAction::Activate(generation),
            ModelFile::Downloading => {
                debug!("Activation {generation} waits for the running model download");
                self.parked = Some(generation);
                GrantAction::Wait
            }
            ModelFile::Missing => {
                info!("Model missing at activation {generation}; downloading again");
                self.parked = Some(generation);
                self.file = ModelFile::Downloading;
                GrantAction::StartDownload
            }
        }
    }

    /// The file is on disk. Returns the parked activation to start.
    pub fn on_download_complete(&mut self) -> Option<u64> {
        self.file = ModelFile::Ready;
        self.parked.take()
    }

    /// The download failed. Returns the parked activation, which must be told.
    pub fn on_download_failed(&mut self) -> Option<u64> {
        self.file = ModelFile::Missing;
        self.parked.take()
    }

    /// The mode was left; nothing waits any more. The download keeps going.
    pub fn unpark(&mut self) {
        self.parked = None;
    }
}
