//! Face-match adapter.
//!
//! Inference is CPU-bound and blocking, so it runs on tokio's blocking
//! pool behind a semaphore. The model is loaded once, on first use;
//! concurrent first callers wait for the same load. Every failure is
//! reported as "not matched" or "not live" by the callers, never as a
//! pass.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{info, warn};

use crate::config::VerificationConfig;

#[derive(Debug, Error)]
pub enum FaceEngineError {
    #[error("no face detected")]
    NoFaceDetected,
    #[error("inference error: {0}")]
    Inference(String),
}

/// A loaded face-recognition model.
///
/// Calls block; they are only ever made from the blocking pool.
pub trait FaceEngine: Send + Sync + 'static {
    /// Whether both images show the same person.
    fn compare(&self, candidate: &[u8], reference: &[u8]) -> Result<bool, FaceEngineError>;
    /// Anti-spoof check on a single image.
    fn is_live(&self, image: &[u8]) -> Result<bool, FaceEngineError>;
}

#[derive(Debug, Error)]
pub enum FaceMatchError {
    #[error("no face detected")]
    NoFaceDetected,
    #[error("face match timed out after {0:?}")]
    TimedOut(Duration),
    #[error("{0}")]
    Failed(String),
}

impl From<FaceEngineError> for FaceMatchError {
    fn from(err: FaceEngineError) -> Self {
        match err {
            FaceEngineError::NoFaceDetected => FaceMatchError::NoFaceDetected,
            FaceEngineError::Inference(msg) => FaceMatchError::Failed(msg),
        }
    }
}

type EngineLoader<E> = Arc<dyn Fn() -> Result<E, FaceEngineError> + Send + Sync>;

pub struct FaceMatcher<E: FaceEngine> {
    engine: OnceCell<Arc<E>>,
    loader: EngineLoader<E>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl<E: FaceEngine> FaceMatcher<E> {
    pub fn new<L>(loader: L, config: &VerificationConfig) -> Self
    where
        L: Fn() -> Result<E, FaceEngineError> + Send + Sync + 'static,
    {
        Self::with_limits(
            loader,
            config.face_match_concurrency,
            Duration::from_secs(config.face_match_timeout_secs),
        )
    }

    pub fn with_limits<L>(loader: L, max_concurrent: usize, timeout: Duration) -> Self
    where
        L: Fn() -> Result<E, FaceEngineError> + Send + Sync + 'static,
    {
        Self {
            engine: OnceCell::new(),
            loader: Arc::new(loader),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }

    async fn engine(&self) -> Result<Arc<E>, FaceMatchError> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                let loader = Arc::clone(&self.loader);
                info!("loading face model");
                match tokio::task::spawn_blocking(move || loader()).await {
                    Ok(Ok(engine)) => Ok(Arc::new(engine)),
                    Ok(Err(e)) => Err(FaceMatchError::Failed(format!("model load: {e}"))),
                    Err(e) => Err(FaceMatchError::Failed(format!("model load task: {e}"))),
                }
            })
            .await?;
        Ok(Arc::clone(engine))
    }

    /// Run one inference job. The permit travels with the blocking task,
    /// so a timed-out job still counts against the pool until it ends.
    async fn run<T, F>(&self, job: F) -> Result<T, FaceMatchError>
    where
        T: Send + 'static,
        F: FnOnce(&E) -> Result<T, FaceEngineError> + Send + 'static,
    {
        let engine = self.engine().await?;
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| FaceMatchError::Failed("face-match pool closed".into()))?;

        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job(&engine)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(FaceMatchError::TimedOut(self.timeout)),
            Ok(Err(e)) => Err(FaceMatchError::Failed(format!("inference task: {e}"))),
            Ok(Ok(result)) => result.map_err(FaceMatchError::from),
        }
    }

    pub async fn verify(
        &self,
        candidate: Vec<u8>,
        reference: Vec<u8>,
    ) -> Result<bool, FaceMatchError> {
        self.run(move |engine| engine.compare(&candidate, &reference))
            .await
    }

    /// Liveness check; any failure reads as "not live".
    pub async fn is_live(&self, image: Vec<u8>) -> bool {
        match self.run(move |engine| engine.is_live(&image)).await {
            Ok(live) => live,
            Err(e) => {
                warn!(error = %e, "liveness check failed");
                false
            }
        }
    }
}
