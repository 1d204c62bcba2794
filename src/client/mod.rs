use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

pub mod preview;
pub mod transport;

pub use preview::{PreviewHandle, PreviewRegistry};
pub use transport::{CaptionTransport, HttpTransport, TransportError};

use crate::codec::{self, mime_type_for_path, CodecError, EncodedImage, ValidationRules};
use crate::history::{HistoryRecord, HistoryStore};

/// A file picked by the user, before validation
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    /// Reads a file from disk, labelling it by extension
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            mime_type: mime_type_for_path(path).to_string(),
            bytes,
        })
    }
}

/// What the user currently sees
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    ImageSelected,
    Requesting,
    Success { caption: String },
    Failed { error: String },
}

/// Result of a [`CaptionClient::generate`] trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// Nothing selected or a request already in flight
    Skipped,
    Captioned(String),
    Failed(String),
}

struct Selection {
    file_name: String,
    image: EncodedImage,
    preview: PreviewHandle,
}

struct ClientInner {
    state: ClientState,
    selection: Option<Selection>,
    in_flight: bool,
    // bumped on every selection so late responses can be recognised
    generation: u64,
}

/// Clears the in-flight guard if a `generate` future is dropped before its
/// response arrives.
struct InFlightRequest<'a> {
    client: &'a CaptionClient,
    generation: u64,
    settled: bool,
}

impl Drop for InFlightRequest<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut inner = self.client.lock();
        inner.in_flight = false;
        if inner.generation == self.generation && inner.state == ClientState::Requesting {
            inner.state = ClientState::ImageSelected;
        }
        debug!("Caption request abandoned before a response arrived");
    }
}

/// Client-side orchestrator for one user session.
///
/// Owns the selected image and its preview, validates before anything is
/// sent, and allows at most one caption request in flight. On success a
/// record is appended to the history store after the response arrives.
pub struct CaptionClient {
    transport: Arc<dyn CaptionTransport>,
    history: Arc<HistoryStore>,
    previews: Arc<PreviewRegistry>,
    rules: ValidationRules,
    inner: Mutex<ClientInner>,
}

impl CaptionClient {
    pub fn new(transport: Arc<dyn CaptionTransport>, history: Arc<HistoryStore>) -> Self {
        Self::with_previews(transport, history, PreviewRegistry::new())
    }

    pub fn with_previews(
        transport: Arc<dyn CaptionTransport>,
        history: Arc<HistoryStore>,
        previews: Arc<PreviewRegistry>,
    ) -> Self {
        Self {
            transport,
            history,
            previews,
            rules: ValidationRules::default(),
            inner: Mutex::new(ClientInner {
                state: ClientState::Idle,
                selection: None,
                in_flight: false,
                generation: 0,
            }),
        }
    }

    pub fn state(&self) -> ClientState {
        self.lock().state.clone()
    }

    pub fn selected_image(&self) -> Option<EncodedImage> {
        self.lock().selection.as_ref().map(|s| s.image.clone())
    }

    pub fn selected_file_name(&self) -> Option<String> {
        self.lock().selection.as_ref().map(|s| s.file_name.clone())
    }

    pub fn preview_url(&self) -> Option<String> {
        self.lock().selection.as_ref().map(|s| s.preview.url())
    }

    pub fn is_requesting(&self) -> bool {
        self.lock().in_flight
    }

    /// Fresh copy of the stored history
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.history.list()
    }

    /// Validates and selects a file.
    ///
    /// A rejected file leaves the current state and selection untouched.
    /// An accepted one replaces the previous selection, releasing its
    /// preview, and clears any shown caption or error.
    pub fn select_file(&self, file: SelectedFile) -> Result<(), CodecError> {
        if let Err(e) = codec::validate(&file.mime_type, &file.bytes, &self.rules) {
            warn!("Rejected {} before upload: {}", file.name, e);
            return Err(e);
        }

        let image = codec::encode(&file.bytes, &file.mime_type);
        let preview = self.previews.acquire();
        debug!("Selected {} ({}, {} bytes)", file.name, file.mime_type, file.bytes.len());

        let previous = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.state = ClientState::ImageSelected;
            inner.selection.replace(Selection {
                file_name: file.name,
                image,
                preview,
            })
        };
        // previous preview released here, outside the lock
        drop(previous);
        Ok(())
    }

    /// Requests a caption for the current selection.
    ///
    /// Does nothing unless an image is selected and no request is in flight.
    #[instrument(skip(self))]
    pub async fn generate(&self) -> GenerateOutcome {
        let (image, generation) = {
            let mut inner = self.lock();
            if inner.in_flight {
                debug!("Caption request already in flight, ignoring trigger");
                return GenerateOutcome::Skipped;
            }
            let image = match inner.selection.as_ref() {
                Some(selection) => selection.image.clone(),
                None => {
                    debug!("No image selected, ignoring trigger");
                    return GenerateOutcome::Skipped;
                }
            };
            inner.in_flight = true;
            inner.state = ClientState::Requesting;
            (image, inner.generation)
        };
        let mut request = InFlightRequest {
            client: self,
            generation,
            settled: false,
        };

        info!("Requesting caption for {} image ({} bytes)", image.mime_type(), image.decoded_len());
        let result = self.transport.generate_caption(&image.to_data_uri()).await;

        let current = {
            let mut inner = self.lock();
            inner.in_flight = false;
            request.settled = true;
            let current = inner.generation == generation;
            if current {
                inner.state = match &result {
                    Ok(caption) => ClientState::Success { caption: caption.clone() },
                    Err(e) => ClientState::Failed { error: e.to_string() },
                };
            }
            current
        };
        if !current {
            debug!("Selection changed while the request was in flight");
        }

        match result {
            Ok(caption) => {
                info!("Caption received: {}", caption);
                if let Err(e) = self.history.append(HistoryRecord::new(&image, &caption)) {
                    warn!("Caption not saved to history: {}", e);
                }
                GenerateOutcome::Captioned(caption)
            },
            Err(e) => {
                warn!("Caption request failed: {}", e);
                GenerateOutcome::Failed(e.to_string())
            },
        }
    }

    /// Returns from a result or error back to the selected image
    pub fn reset(&self) {
        let mut inner = self.lock();
        if matches!(inner.state, ClientState::Success { .. } | ClientState::Failed { .. }) {
            inner.state = ClientState::ImageSelected;
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClientInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
