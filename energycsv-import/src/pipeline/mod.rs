use std::{path::PathBuf, pin::Pin, sync::Arc};

use futures::{Stream, StreamExt, TryStreamExt};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    /// 1-based data row the payload was read from.
    pub row: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("failed to read '{}': {reason}", path.display())]
    Read { path: PathBuf, reason: String },
    #[error("missing column '{column}' in '{}'", path.display())]
    MissingColumn { path: PathBuf, column: String },
    #[error("malformed row {row} in '{}': {reason}", path.display())]
    MalformedRow {
        path: PathBuf,
        row: u64,
        reason: String,
    },
    #[error("row {row} rejected: {reason}")]
    Rejected { row: u64, reason: String },
    #[error("failed to remove consumed file '{}': {reason}", path.display())]
    Consume { path: PathBuf, reason: String },
}

pub type EnvelopeStream<T> = Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> EnvelopeStream<T>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

pub struct Pipeline<S, T> {
    pub source: S,
    pub transforms: Vec<Arc<dyn Transform<T, T> + Send + Sync>>, // same-type transforms chain
}

impl<T, S> Pipeline<S, T>
where
    T: Send + 'static,
    S: Source<T> + Send + Sync + 'static,
{
    pub async fn stream(self) -> EnvelopeStream<T> {
        let mut stream = self.source.stream().await;

        // Apply transforms in sequence (if any).
        for t in self.transforms {
            let t_arc = t.clone();
            stream = Box::pin(stream.then(move |item| {
                let t_inner = t_arc.clone();
                async move {
                    match item {
                        Ok(env) => t_inner.apply(env).await,
                        Err(e) => Err(e),
                    }
                }
            }));
        }

        stream
    }

    /// Drain the pipeline into payloads, stopping at the first error.
    pub async fn collect(self) -> Result<Vec<T>, PipelineError> {
        self.stream()
            .await
            .map_ok(|env| env.payload)
            .try_collect()
            .await
    }
}
