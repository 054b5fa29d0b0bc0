//! Per-request query batching and deduplication.
//!
//! A resolution walk registers every query it needs against a
//! [`BatchedSearchSource`], then flushes. Structurally equal queries collapse
//! into one backend request; all registered waiters of a query receive the
//! same decoded response. Failures are isolated: an inline per-item error
//! reaches only that query's waiters, while a failed round trip reaches
//! everyone in the batch.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use searchgraph_proto::SearchResponse;

use crate::error::Error;
use crate::metadata::Metadata;
use crate::query::DatastoreQuery;

use super::client::DatastoreClient;

/// A response that resolves once the owning batch has been flushed.
pub struct SearchFuture {
    receiver: oneshot::Receiver<Result<SearchResponse, Error>>,
}

impl SearchFuture {
    /// Wait for the batched response.
    pub async fn resolve(self) -> Result<SearchResponse, Error> {
        match self.receiver.await {
            Ok(result) => result,
            // The source was dropped without flushing; treat as an
            // infrastructure failure rather than hanging forever.
            Err(_) => Err(Error::Datastore(
                "batch dropped before a response was delivered".to_string(),
            )),
        }
    }
}

struct PendingQuery {
    query: DatastoreQuery,
    waiters: Vec<oneshot::Sender<Result<SearchResponse, Error>>>,
}

/// Collects queries for one resolution walk and executes them together.
pub struct BatchedSearchSource {
    client: Arc<dyn DatastoreClient>,
    metadata: Arc<Metadata>,
    pending: Mutex<Vec<PendingQuery>>,
}

impl BatchedSearchSource {
    /// Create a source bound to a client and metadata.
    pub fn new(client: Arc<dyn DatastoreClient>, metadata: Arc<Metadata>) -> Self {
        Self {
            client,
            metadata,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Register a query, returning a future for its response.
    ///
    /// A query structurally equal to one already pending shares its backend
    /// request. The future resolves after the next [`Self::flush`].
    pub fn submit(&self, query: DatastoreQuery) -> SearchFuture {
        let (sender, receiver) = oneshot::channel();
        let mut pending = self.pending.lock();
        // serde_json::Value has no Hash, so dedup is a linear scan over the
        // batch; batches are resolver-sized, not unbounded.
        if let Some(entry) = pending.iter_mut().find(|entry| entry.query == query) {
            entry.waiters.push(sender);
        } else {
            pending.push(PendingQuery {
                query,
                waiters: vec![sender],
            });
        }
        SearchFuture { receiver }
    }

    /// Number of distinct queries currently pending.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Execute all pending queries in one multiplexed call and fan the
    /// responses out to their waiters.
    pub async fn flush(&self) -> Result<(), Error> {
        let pending: Vec<PendingQuery> = std::mem::take(&mut *self.pending.lock());
        if pending.is_empty() {
            return Ok(());
        }

        let now = Instant::now();
        let mut live = Vec::with_capacity(pending.len());
        let mut requests = Vec::with_capacity(pending.len());
        for entry in pending {
            if entry.query.deadline.is_some_and(|deadline| deadline <= now) {
                deliver(entry.waiters, || Err(Error::Timeout));
                continue;
            }
            match entry.query.to_search_request(&self.metadata) {
                Ok(request) => {
                    requests.push(request);
                    live.push(entry);
                }
                Err(error) => {
                    let message = error.to_string();
                    let client_visible = error.is_client_visible();
                    deliver(entry.waiters, || {
                        if client_visible {
                            Err(Error::InvalidArgument(message.clone()))
                        } else {
                            Err(Error::Datastore(message.clone()))
                        }
                    });
                }
            }
        }
        if live.is_empty() {
            return Ok(());
        }

        debug!(queries = live.len(), "executing search batch");
        // The body timeout is only a hint to the backend; the call itself is
        // aborted at the earliest deadline in the batch so a stalled backend
        // cannot hold every waiter.
        let call = self.client.multi_search(requests);
        let earliest = live.iter().filter_map(|entry| entry.query.deadline).min();
        let outcome = match earliest {
            Some(deadline) => match tokio::time::timeout_at(deadline.into(), call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    for entry in live {
                        deliver(entry.waiters, || Err(Error::Timeout));
                    }
                    return Err(Error::Timeout);
                }
            },
            None => call.await,
        };
        let items = match outcome {
            Ok(items) => items,
            Err(error) => {
                let message = error.to_string();
                for entry in live {
                    deliver(entry.waiters, || Err(Error::Datastore(message.clone())));
                }
                return Err(Error::Datastore(message));
            }
        };

        if items.len() != live.len() {
            let message = format!(
                "multiplexed response carried {} items for {} requests",
                items.len(),
                live.len()
            );
            for entry in live {
                deliver(entry.waiters, || {
                    Err(Error::MalformedResponse(message.clone()))
                });
            }
            return Err(Error::MalformedResponse(message));
        }

        for (entry, item) in live.into_iter().zip(items) {
            match item.into_result() {
                Ok(response) if response.timed_out => {
                    deliver(entry.waiters, || Err(Error::Timeout));
                }
                Ok(response) => {
                    deliver(entry.waiters, || Ok(response.clone()));
                }
                Err(error) => {
                    let message = format!("{}: {}", error.kind, error.reason);
                    deliver(entry.waiters, || Err(Error::Datastore(message.clone())));
                }
            }
        }
        Ok(())
    }
}

fn deliver(
    waiters: Vec<oneshot::Sender<Result<SearchResponse, Error>>>,
    result: impl Fn() -> Result<SearchResponse, Error>,
) {
    for waiter in waiters {
        // A waiter that gave up is not an error.
        let _ = waiter.send(result());
    }
}
