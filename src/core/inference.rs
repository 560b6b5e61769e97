/// Inference engine seam and its actor handle.
///
/// The engine is a single mutable instance. It is owned by one actor thread;
/// everything else talks to it through a cloneable [`InferenceHandle`] that
/// queues commands on a bounded channel. Calls are therefore serialized, and
/// a full queue is rejected instead of piling up.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::core::model_file::{self, ModelFileError};
use crate::core::panic_message;

/// Failure reported by an engine operation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("model file validation failed: {0}")]
    InvalidModel(#[from] ModelFileError),
    #[error("{0}")]
    Backend(String),
}

/// Failure of a call made through [`InferenceHandle`].
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// The command queue is full
    #[error("inference engine busy")]
    Busy,
    /// The actor thread is gone
    #[error("inference engine unavailable")]
    Unavailable,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A local LLM runtime.
///
/// Implementations may block; they are only ever called from the actor thread.
pub trait InferenceEngine: Send + 'static {
    /// Load the model named by `model`, replacing any loaded one.
    fn load(&mut self, model: &str) -> Result<(), EngineError>;

    /// Produce a completion of at most `max_tokens` tokens.
    fn generate(&mut self, prompt: &str, max_tokens: u32) -> Result<String, EngineError>;

    /// Release the loaded model, if any.
    fn dispose(&mut self);

    /// Approximate resident size of the loaded model.
    fn memory_footprint(&self) -> Option<u64> {
        None
    }
}

/// Lifecycle of the loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    NotLoaded,
    Loading,
    Ready,
    Error,
}

impl ModelState {
    /// Wire name used by the model status resource.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::NotLoaded => "not_loaded",
            ModelState::Loading => "loading",
            ModelState::Ready => "ready",
            ModelState::Error => "error",
        }
    }
}

/// Point-in-time view of the engine, readable without queueing on the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub state: ModelState,
    /// Model named by the most recent load
    pub model: Option<String>,
    /// Engine-reported footprint of the loaded model
    pub memory_bytes: Option<u64>,
    /// Reason the last load failed
    pub last_error: Option<String>,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            state: ModelState::NotLoaded,
            model: None,
            memory_bytes: None,
            last_error: None,
        }
    }
}

enum Command {
    Load {
        model: String,
    },
    Generate {
        prompt: String,
        max_tokens: u32,
        reply: oneshot::Sender<Result<String, EngineError>>,
    },
    Dispose,
}

/// Status plus a counter bumped on every write, so a caller can tell whether
/// anyone else wrote since it last looked.
#[derive(Debug, Default)]
struct StatusCell {
    current: EngineStatus,
    revision: u64,
}

impl StatusCell {
    fn set(&mut self, f: impl FnOnce(&mut EngineStatus)) {
        f(&mut self.current);
        self.revision += 1;
    }
}

type SharedStatus = Arc<Mutex<StatusCell>>;

/// Cloneable front end of the inference actor.
#[derive(Clone)]
pub struct InferenceHandle {
    tx: mpsc::Sender<Command>,
    status: SharedStatus,
}

impl InferenceHandle {
    /// Start the actor thread that owns `engine`.
    ///
    /// The engine is disposed once every handle has been dropped.
    pub fn spawn<E: InferenceEngine>(engine: E, queue_depth: usize) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let status = SharedStatus::default();
        let actor_status = status.clone();

        std::thread::Builder::new()
            .name("inference".into())
            .spawn(move || run_actor(engine, rx, actor_status))?;

        Ok(Self { tx, status })
    }

    /// Queue a model load and return immediately.
    pub fn load(&self, model: impl Into<String>) -> Result<(), InferenceError> {
        let model = model.into();
        // Mark loading before queueing so the actor's outcome always lands last.
        let (previous, marked) = self.mark_loading(&model);
        self.try_send(Command::Load { model })
            .inspect_err(|_| self.restore_if_unchanged(previous, marked))
    }

    /// Queue a generation and wait for its text.
    ///
    /// Dropping the returned future abandons the request; if it has not
    /// started yet the actor skips it.
    ///
    /// # Arguments
    /// * `prompt` - Input text
    /// * `max_tokens` - Upper bound on generated tokens
    pub async fn generate(&self, prompt: String, max_tokens: u32) -> Result<String, InferenceError> {
        let (reply, rx) = oneshot::channel();
        self.try_send(Command::Generate {
            prompt,
            max_tokens,
            reply,
        })?;
        Ok(rx.await.map_err(|_| InferenceError::Unavailable)??)
    }

    /// Queue release of the loaded model; status returns to `not_loaded`.
    pub fn dispose(&self) -> Result<(), InferenceError> {
        self.try_send(Command::Dispose)
    }

    /// Current status snapshot, without queueing on the actor.
    pub fn status(&self) -> EngineStatus {
        lock(&self.status).current.clone()
    }

    /// Flip to `loading`, returning the status it replaced and the revision
    /// written.
    fn mark_loading(&self, model: &str) -> (EngineStatus, u64) {
        let mut cell = lock(&self.status);
        let previous = cell.current.clone();
        cell.set(|s| {
            s.state = ModelState::Loading;
            s.model = Some(model.to_string());
            s.last_error = None;
        });
        (previous, cell.revision)
    }

    /// Undo [`Self::mark_loading`] unless the actor has written since.
    fn restore_if_unchanged(&self, previous: EngineStatus, marked: u64) {
        let mut cell = lock(&self.status);
        if cell.revision == marked {
            cell.set(|s| *s = previous);
        }
    }

    fn try_send(&self, command: Command) -> Result<(), InferenceError> {
        self.tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => InferenceError::Busy,
            mpsc::error::TrySendError::Closed(_) => InferenceError::Unavailable,
        })
    }
}

fn lock(status: &SharedStatus) -> MutexGuard<'_, StatusCell> {
    status.lock().unwrap_or_else(PoisonError::into_inner)
}

fn update(status: &SharedStatus, f: impl FnOnce(&mut EngineStatus)) {
    lock(status).set(f);
}

fn run_actor<E: InferenceEngine>(mut engine: E, mut rx: mpsc::Receiver<Command>, status: SharedStatus) {
    debug!("Inference actor started");

    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Load { model } => {
                info!(model = %model, "Loading model");
                let result = catch_unwind(AssertUnwindSafe(|| engine.load(&model)))
                    .unwrap_or_else(|p| Err(EngineError::Backend(panic_message(p.as_ref()))));
                match result {
                    Ok(()) => {
                        info!(model = %model, "Model loaded");
                        let footprint = engine.memory_footprint();
                        update(&status, |s| {
                            s.state = ModelState::Ready;
                            s.memory_bytes = footprint;
                            s.last_error = None;
                        });
                    }
                    Err(e) => {
                        error!(model = %model, error = %e, "Failed to load model");
                        update(&status, |s| {
                            s.state = ModelState::Error;
                            s.memory_bytes = None;
                            s.last_error = Some(e.to_string());
                        });
                    }
                }
            }
            Command::Generate {
                prompt,
                max_tokens,
                reply,
            } => {
                if reply.is_closed() {
                    debug!("Skipping generation for a caller that went away");
                    continue;
                }
                debug!(prompt_len = prompt.len(), max_tokens, "Generating response");
                let result = catch_unwind(AssertUnwindSafe(|| engine.generate(&prompt, max_tokens)))
                    .unwrap_or_else(|p| Err(EngineError::Backend(panic_message(p.as_ref()))));
                if let Err(e) = &result {
                    warn!(error = %e, "Generation failed");
                }
                let _ = reply.send(result);
            }
            Command::Dispose => {
                engine.dispose();
                info!("Model disposed");
                update(&status, |s| *s = EngineStatus::default());
            }
        }
    }

    engine.dispose();
    debug!("Inference actor stopped");
}

/// Built-in engine used when no native runtime is linked.
///
/// `load` resolves and boundary-checks the model file; `generate` echoes the
/// prompt back with the token limit.
pub struct PlaceholderEngine {
    search_dirs: Vec<PathBuf>,
    min_model_bytes: u64,
    loaded: Option<(PathBuf, u64)>,
}

impl PlaceholderEngine {
    /// Engine that looks for model files in `search_dirs`, in order.
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            min_model_bytes: model_file::MIN_MODEL_BYTES,
            loaded: None,
        }
    }

    pub fn with_min_model_bytes(mut self, min_model_bytes: u64) -> Self {
        self.min_model_bytes = min_model_bytes;
        self
    }
}

impl InferenceEngine for PlaceholderEngine {
    fn load(&mut self, model: &str) -> Result<(), EngineError> {
        let path = model_file::resolve(model, &self.search_dirs)
            .ok_or_else(|| EngineError::ModelNotFound(model.to_string()))?;
        let format = model_file::validate_with_min_size(&path, self.min_model_bytes)?;
        debug!(path = %path.display(), ?format, "Model file accepted");

        let size = std::fs::metadata(&path)
            .map(|m| m.len())
            .map_err(|e| EngineError::Backend(e.to_string()))?;
        self.loaded = Some((path, size));
        Ok(())
    }

    fn generate(&mut self, prompt: &str, max_tokens: u32) -> Result<String, EngineError> {
        Ok(format!(
            "Generated response for: {} (max_tokens: {})",
            prompt, max_tokens
        ))
    }

    fn dispose(&mut self) {
        self.loaded = None;
    }

    fn memory_footprint(&self) -> Option<u64> {
        self.loaded.as_ref().map(|(_, size)| *size)
    }
}
