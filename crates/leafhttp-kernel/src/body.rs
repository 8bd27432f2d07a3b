//! Request-body plans and ingesters (§4.3).

use crate::incident::Incident;
use std::sync::Arc;

/// The outcome of finishing a [`BodyIngester`].
pub type IngestResult<T> = Result<T, Incident>;

/// A tagged union of the supported body-handling strategies (§3).
///
/// When a response declaration does not call `.request_body(..)`, the plan
/// defaults to [`BodyPlan::prohibited`] (§3 invariant).
#[derive(Clone)]
pub enum BodyPlan<B> {
    /// Zero-length bodies only.
    Prohibited {
        finalize: Arc<dyn Fn(Vec<u8>) -> IngestResult<B> + Send + Sync>,
    },
    /// Buffer the whole body, rejecting once `limit` bytes have arrived.
    Collect {
        limit: u64,
        finalize: Arc<dyn Fn(Vec<u8>) -> IngestResult<B> + Send + Sync>,
    },
    /// Fold chunks into an accumulator.
    Reduce {
        limit: u64,
        initial: Arc<dyn Fn() -> B + Send + Sync>,
        step: Arc<dyn Fn(B, &[u8]) -> B + Send + Sync>,
    },
    /// Decode the complete body as JSON into `B`.
    #[cfg(feature = "json")]
    Json {
        limit: u64,
        finalize: Arc<dyn Fn(Vec<u8>) -> IngestResult<B> + Send + Sync>,
    },
}

impl<B> BodyPlan<B> {
    /// The byte limit this plan enforces; `0` for `Prohibited`.
    pub fn limit(&self) -> u64 {
        match self {
            BodyPlan::Prohibited { .. } => 0,
            BodyPlan::Collect { limit, .. } => *limit,
            BodyPlan::Reduce { limit, .. } => *limit,
            #[cfg(feature = "json")]
            BodyPlan::Json { limit, .. } => *limit,
        }
    }

    /// Build a fresh per-request ingester from this plan and an effective
    /// limit (the response's own limit if set, else the cascaded group
    /// default, else the endpoint default — §4.3, §4.8).
    pub fn make_ingester(&self, effective_limit: u64) -> BodyIngester<B> {
        let state = match self {
            BodyPlan::Prohibited { finalize } => {
                IngesterState::Bytes(Vec::new(), Arc::clone(finalize))
            }
            BodyPlan::Collect { finalize, .. } => {
                IngesterState::Bytes(Vec::new(), Arc::clone(finalize))
            }
            BodyPlan::Reduce { initial, step, .. } => {
                IngesterState::Reduce(Some(initial()), Arc::clone(step))
            }
            #[cfg(feature = "json")]
            BodyPlan::Json { finalize, .. } => {
                IngesterState::Bytes(Vec::new(), Arc::clone(finalize))
            }
        };
        BodyIngester {
            limit: effective_limit,
            received: 0,
            state,
        }
    }
}

impl BodyPlan<()> {
    pub fn prohibited() -> Self {
        BodyPlan::Prohibited {
            finalize: Arc::new(|_| Ok(())),
        }
    }
}

impl BodyPlan<Vec<u8>> {
    pub fn collect(limit: u64) -> Self {
        BodyPlan::Collect {
            limit,
            finalize: Arc::new(Ok),
        }
    }
}

impl<B: Send + Sync + 'static> BodyPlan<B> {
    pub fn reduce(
        limit: u64,
        initial: impl Fn() -> B + Send + Sync + 'static,
        step: impl Fn(B, &[u8]) -> B + Send + Sync + 'static,
    ) -> Self {
        BodyPlan::Reduce {
            limit,
            initial: Arc::new(initial),
            step: Arc::new(step),
        }
    }
}

#[cfg(feature = "json")]
impl<B: serde::de::DeserializeOwned + Send + Sync + 'static> BodyPlan<B> {
    pub fn json(limit: u64) -> Self {
        BodyPlan::Json {
            limit,
            finalize: Arc::new(|buf| {
                serde_json::from_slice(&buf).map_err(|_| Incident::BadRequest)
            }),
        }
    }
}

enum IngesterState<B> {
    Bytes(Vec<u8>, Arc<dyn Fn(Vec<u8>) -> IngestResult<B> + Send + Sync>),
    // `Option` lets `push_chunk` take the accumulator by value to fold it
    // without requiring `B: Default`; it is `Some` at every observable point.
    Reduce(Option<B>, Arc<dyn Fn(B, &[u8]) -> B + Send + Sync>),
}

/// A stateful per-request ingester built from a [`BodyPlan`] plus the
/// effective byte limit.
pub struct BodyIngester<B> {
    limit: u64,
    received: u64,
    state: IngesterState<B>,
}

impl<B> BodyIngester<B> {
    /// Feed one chunk. Returns `Err(ContentTooLarge)` as soon as the
    /// cumulative length first crosses the limit (§8 invariant). The
    /// `Prohibited` plan's `limit` is always `0`, so any non-empty chunk
    /// trips this immediately.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<(), Incident> {
        self.received += chunk.len() as u64;
        if self.received > self.limit {
            return Err(Incident::ContentTooLarge);
        }
        match &mut self.state {
            IngesterState::Bytes(buf, _) => buf.extend_from_slice(chunk),
            IngesterState::Reduce(acc, step) => {
                let current = acc.take().expect("reduce accumulator is present between chunks");
                *acc = Some(step(current, chunk));
            }
        }
        Ok(())
    }

    /// Finalize after the end-of-body marker.
    pub fn finish(self) -> IngestResult<B> {
        match self.state {
            IngesterState::Bytes(buf, finalize) => finalize(buf),
            IngesterState::Reduce(acc, _) => {
                Ok(acc.expect("reduce accumulator is present at finish"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prohibited_rejects_any_nonzero_chunk() {
        let plan: BodyPlan<()> = BodyPlan::prohibited();
        let mut ingester = plan.make_ingester(0);
        assert_eq!(ingester.push_chunk(b"x"), Err(Incident::ContentTooLarge));
    }

    #[test]
    fn prohibited_accepts_zero_length() {
        let plan: BodyPlan<()> = BodyPlan::prohibited();
        let ingester = plan.make_ingester(0);
        assert_eq!(ingester.finish(), Ok(()));
    }

    #[test]
    fn collect_accumulates_until_limit() {
        let plan = BodyPlan::collect(10);
        let mut ingester = plan.make_ingester(10);
        ingester.push_chunk(b"hello").unwrap();
        ingester.push_chunk(b"world").unwrap();
        assert_eq!(ingester.finish().unwrap(), b"helloworld".to_vec());
    }

    #[test]
    fn collect_rejects_at_the_crossing_chunk() {
        let plan = BodyPlan::collect(8);
        let mut ingester = plan.make_ingester(8);
        ingester.push_chunk(b"12345").unwrap();
        assert_eq!(ingester.push_chunk(b"1234"), Err(Incident::ContentTooLarge));
    }

    #[test]
    fn reduce_folds_chunks_into_accumulator() {
        let plan: BodyPlan<u64> =
            BodyPlan::reduce(1024, || 0u64, |acc, chunk| acc + chunk.len() as u64);
        let mut ingester = plan.make_ingester(1024);
        ingester.push_chunk(b"abc").unwrap();
        ingester.push_chunk(b"de").unwrap();
        assert_eq!(ingester.finish().unwrap(), 5);
    }

    #[test]
    fn reduce_respects_limit() {
        let plan: BodyPlan<u64> =
            BodyPlan::reduce(4, || 0u64, |acc, chunk| acc + chunk.len() as u64);
        let mut ingester = plan.make_ingester(4);
        assert_eq!(ingester.push_chunk(b"abcde"), Err(Incident::ContentTooLarge));
    }
}
