//! Background decode pool.
//!
//! Jobs go out over one shared channel to a bounded set of worker threads and
//! come back over a single completion channel that the owner thread polls
//! once per frame. With zero workers jobs queue up and run inline during
//! [`Loader::drain`], which keeps tests deterministic.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use engine_core::{DecodeError, DecodedImage, ImageDecoder, ImageSource, ResizeHint};
use parking_lot::Mutex;
use rune_text::{FontBackend, FontError, FontFace};
use tracing::{debug, trace, warn};

use crate::resource::ResourceId;

/// Where the bytes of a font face come from.
#[derive(Clone)]
pub enum FontSource {
    File(PathBuf, u32),
    Bytes(Arc<[u8]>, u32),
    /// An already constructed backend, used as is.
    Face(Arc<dyn FontBackend>),
}

impl std::fmt::Debug for FontSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontSource::File(path, index) => f.debug_tuple("File").field(path).field(index).finish(),
            FontSource::Bytes(bytes, index) => f
                .debug_tuple("Bytes")
                .field(&bytes.len())
                .field(index)
                .finish(),
            FontSource::Face(_) => f.write_str("Face(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Job {
    DecodeImage {
        source: ImageSource,
        resize: Option<ResizeHint>,
    },
    LoadFont(FontSource),
}

pub(crate) enum Payload {
    Image(DecodedImage),
    Font(Arc<dyn FontBackend>),
}

pub(crate) struct Completion {
    pub id: ResourceId,
    pub result: Result<Payload, DecodeError>,
}

struct Task {
    id: ResourceId,
    job: Job,
    cancel: Arc<AtomicBool>,
}

/// Cancellation flag shared between the cache and a queued or running task.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct Loader {
    jobs: Option<Sender<Task>>,
    completion_tx: Sender<Completion>,
    completions: Receiver<Completion>,
    workers: Vec<JoinHandle<()>>,
    inline: VecDeque<Task>,
    decoder: Arc<dyn ImageDecoder>,
}

impl Loader {
    /// Spawn `workers` decode threads; `0` selects inline mode.
    pub fn new(workers: usize, decoder: Arc<dyn ImageDecoder>) -> Self {
        let (completion_tx, completions) = mpsc::channel();
        let mut loader = Self {
            jobs: None,
            completion_tx,
            completions,
            workers: Vec::new(),
            inline: VecDeque::new(),
            decoder,
        };
        if workers == 0 {
            debug!("resource loader running inline");
            return loader;
        }

        let (job_tx, job_rx) = mpsc::channel::<Task>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        for n in 0..workers {
            let job_rx = job_rx.clone();
            let done = loader.completion_tx.clone();
            let decoder = loader.decoder.clone();
            let spawned = thread::Builder::new()
                .name(format!("rune-loader-{n}"))
                .spawn(move || {
                    loop {
                        // Hold the lock only while waiting for the next task.
                        let task = job_rx.lock().recv();
                        let Ok(task) = task else {
                            break;
                        };
                        if let Some(completion) = run(task, decoder.as_ref()) {
                            if done.send(completion).is_err() {
                                break;
                            }
                        }
                    }
                });
            match spawned {
                Ok(handle) => loader.workers.push(handle),
                Err(err) => warn!(?err, "failed to spawn loader worker"),
            }
        }
        if loader.workers.is_empty() {
            warn!("no loader workers could be started; falling back to inline decoding");
        } else {
            loader.jobs = Some(job_tx);
        }
        debug!(workers = loader.workers.len(), "resource loader started");
        loader
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue `job` for `id`. The returned flag cancels it.
    pub(crate) fn submit(&mut self, id: ResourceId, job: Job) -> CancelFlag {
        let flag = CancelFlag::default();
        let task = Task {
            id,
            job,
            cancel: flag.0.clone(),
        };
        trace!(?id, "submitting load task");
        match &self.jobs {
            Some(jobs) => {
                if let Err(mpsc::SendError(task)) = jobs.send(task) {
                    warn!(?id, "loader workers are gone; decoding inline");
                    self.inline.push_back(task);
                }
            }
            None => self.inline.push_back(task),
        }
        flag
    }

    /// Deliver a result without going through a worker.
    pub(crate) fn complete_now(&self, id: ResourceId, result: Result<Payload, DecodeError>) {
        // The receiver lives in `self`, so the send cannot fail.
        let _ = self.completion_tx.send(Completion { id, result });
    }

    /// Run queued inline tasks, then collect every finished completion.
    pub(crate) fn drain(&mut self) -> Vec<Completion> {
        while let Some(task) = self.inline.pop_front() {
            if let Some(completion) = run(task, self.decoder.as_ref()) {
                self.complete_now(completion.id, completion.result);
            }
        }
        self.completions.try_iter().collect()
    }

    /// Block until at least one completion arrives or `timeout` elapses.
    pub(crate) fn wait(&mut self, timeout: Duration) -> Vec<Completion> {
        let mut out = self.drain();
        if !out.is_empty() {
            return out;
        }
        match self.completions.recv_timeout(timeout) {
            Ok(first) => {
                out.push(first);
                out.extend(self.completions.try_iter());
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        }
        out
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        self.jobs.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("loader worker panicked");
            }
        }
    }
}

/// Execute one task unless it was cancelled before starting. A task
/// cancelled while running finishes but its result is suppressed.
fn run(task: Task, decoder: &dyn ImageDecoder) -> Option<Completion> {
    if task.cancel.load(Ordering::Acquire) {
        trace!(id = ?task.id, "skipping cancelled task");
        return None;
    }
    let result = execute(&task.job, decoder);
    if task.cancel.load(Ordering::Acquire) {
        trace!(id = ?task.id, "dropping result of cancelled task");
        return None;
    }
    Some(Completion {
        id: task.id,
        result,
    })
}

fn execute(job: &Job, decoder: &dyn ImageDecoder) -> Result<Payload, DecodeError> {
    match job {
        Job::DecodeImage { source, resize } => decoder.decode(source, *resize).map(Payload::Image),
        Job::LoadFont(source) => {
            let face = match source {
                FontSource::Face(face) => return Ok(Payload::Font(face.clone())),
                FontSource::File(path, index) => {
                    FontFace::from_path(path, *index).map_err(|e| font_error(e, Some(path)))?
                }
                FontSource::Bytes(bytes, index) => {
                    FontFace::from_bytes(bytes, *index).map_err(|e| font_error(e, None))?
                }
            };
            Ok(Payload::Font(Arc::new(face)))
        }
    }
}

fn font_error(err: FontError, path: Option<&PathBuf>) -> DecodeError {
    match (err, path) {
        (FontError::Io(io), Some(path)) => DecodeError::Io {
            path: path.clone(),
            message: io.to_string(),
        },
        (err, _) => DecodeError::Font(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use engine_core::{ImageCrateDecoder, PixelFormat};

    use crate::resource::ResourceKind;

    struct FixedDecoder;

    impl ImageDecoder for FixedDecoder {
        fn decode(
            &self,
            source: &ImageSource,
            _resize: Option<ResizeHint>,
        ) -> Result<DecodedImage, DecodeError> {
            match source {
                ImageSource::Bytes(b) if !b.is_empty() => Ok(DecodedImage {
                    width: 1,
                    height: 1,
                    pixels: vec![0, 0, 0, 255],
                    format: PixelFormat::Rgba8,
                }),
                _ => Err(DecodeError::Empty),
            }
        }
    }

    fn id(serial: u64) -> ResourceId {
        ResourceId::new(ResourceKind::Image, serial)
    }

    fn image_job(bytes: &[u8]) -> Job {
        Job::DecodeImage {
            source: ImageSource::Bytes(Arc::from(bytes)),
            resize: None,
        }
    }

    #[test]
    fn inline_mode_runs_on_drain() {
        let mut loader = Loader::new(0, Arc::new(FixedDecoder));
        loader.submit(id(1), image_job(&[1]));
        loader.submit(id(2), image_job(&[]));
        let done = loader.drain();
        assert_eq!(done.len(), 2);
        assert!(matches!(done[0].result, Ok(Payload::Image(_))));
        assert!(matches!(done[1].result, Err(DecodeError::Empty)));
        assert!(loader.drain().is_empty());
    }

    #[test]
    fn cancelled_before_start_is_skipped() {
        let mut loader = Loader::new(0, Arc::new(FixedDecoder));
        let flag = loader.submit(id(1), image_job(&[1]));
        flag.cancel();
        assert!(flag.is_cancelled());
        assert!(loader.drain().is_empty());
    }

    #[test]
    fn threaded_pool_delivers_results() {
        let mut loader = Loader::new(2, Arc::new(ImageCrateDecoder::default()));
        assert_eq!(loader.worker_count(), 2);
        loader.submit(id(7), image_job(b"not an image"));
        let mut done = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(10);
        while done.is_empty() && Instant::now() < deadline {
            done.extend(loader.wait(Duration::from_millis(100)));
        }
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, id(7));
        assert!(matches!(done[0].result, Err(DecodeError::Image(_))));
    }

    #[test]
    fn font_sources_load_or_fail() {
        let mut loader = Loader::new(0, Arc::new(FixedDecoder));
        let face: Arc<dyn FontBackend> = Arc::new(rune_text::BoxFont::default());
        loader.submit(id(1), Job::LoadFont(FontSource::Face(face)));
        loader.submit(
            id(2),
            Job::LoadFont(FontSource::Bytes(Arc::from(&b"garbage"[..]), 0)),
        );
        loader.submit(
            id(3),
            Job::LoadFont(FontSource::File(PathBuf::from("/nonexistent/font.ttf"), 0)),
        );
        let done = loader.drain();
        assert!(matches!(done[0].result, Ok(Payload::Font(_))));
        assert!(matches!(done[1].result, Err(DecodeError::Font(_))));
        assert!(matches!(done[2].result, Err(DecodeError::Io { .. })));
    }
}
