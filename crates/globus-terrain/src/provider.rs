//! The terrain provider contract and a synchronous scripted implementation.

use std::collections::VecDeque;
use std::sync::Mutex;

use globus_math::Extent;

use crate::tile::{TerrainMetadata, TerrainRequest, TerrainResponse, Ticket, TileKey};

/// Asynchronous source of tile height samples.
///
/// Requests are fire-and-forget; answers are collected by polling
/// [`TerrainProvider::drain_responses`] once per frame on the render thread.
pub trait TerrainProvider {
    /// Grid sizes and zoom range of the data.
    fn metadata(&self) -> &TerrainMetadata;

    /// Queue a request. Returns the request back if the provider is saturated.
    #[allow(clippy::result_large_err)]
    fn submit(&self, request: TerrainRequest) -> Result<(), TerrainRequest>;

    /// Drop a pending request. Unknown or finished tickets are ignored.
    fn cancel(&self, ticket: Ticket);

    /// Every response that arrived since the previous call.
    fn drain_responses(&self) -> Vec<TerrainResponse>;
}

type SampleFn = dyn Fn(&TileKey, &Extent) -> Vec<f32> + Send + Sync;

/// Provider that computes samples with a closure and answers every request
/// submitted before a drain on that drain. Deterministic, used by tests and
/// tools.
pub struct SyncTerrainProvider {
    metadata: TerrainMetadata,
    sample: Box<SampleFn>,
    pending: Mutex<VecDeque<TerrainRequest>>,
    capacity: usize,
}

impl SyncTerrainProvider {
    pub fn new<F>(metadata: TerrainMetadata, sample: F) -> Self
    where
        F: Fn(&TileKey, &Extent) -> Vec<f32> + Send + Sync + 'static,
    {
        Self {
            metadata,
            sample: Box::new(sample),
            pending: Mutex::new(VecDeque::new()),
            capacity: usize::MAX,
        }
    }

    /// A provider answering every tile in its zoom range with a constant height
    /// and every other tile with no data.
    pub fn constant(metadata: TerrainMetadata, height: f32) -> Self {
        let count = metadata.samples_per_tile();
        let zoom_range = metadata.min_zoom..=metadata.max_zoom;
        Self::new(metadata, move |key, _| {
            if zoom_range.contains(&key.zoom) {
                vec![height; count]
            } else {
                Vec::new()
            }
        })
    }

    /// Limit the number of unanswered requests.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Number of unanswered requests.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl TerrainProvider for SyncTerrainProvider {
    fn metadata(&self) -> &TerrainMetadata {
        &self.metadata
    }

    fn submit(&self, request: TerrainRequest) -> Result<(), TerrainRequest> {
        let Ok(mut pending) = self.pending.lock() else {
            return Err(request);
        };
        if pending.len() >= self.capacity {
            return Err(request);
        }
        pending.push_back(request);
        Ok(())
    }

    fn cancel(&self, ticket: Ticket) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|r| r.ticket != ticket);
        }
    }

    fn drain_responses(&self) -> Vec<TerrainResponse> {
        let requests: Vec<TerrainRequest> = match self.pending.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return Vec::new(),
        };
        requests
            .into_iter()
            .map(|r| TerrainResponse {
                ticket: r.ticket,
                key: r.key,
                elevations: (self.sample)(&r.key, &r.extent),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> TerrainMetadata {
        TerrainMetadata {
            file_grid_size: 4,
            min_zoom: 1,
            max_zoom: 3,
            grid_size_by_zoom: vec![4],
        }
    }

    fn request(ticket: u64, zoom: u8) -> TerrainRequest {
        let key = TileKey::new(zoom, 0, 0);
        TerrainRequest {
            ticket: Ticket(ticket),
            key,
            extent: key.extent(),
        }
    }

    #[test]
    fn test_constant_provider_answers_on_drain() {
        let provider = SyncTerrainProvider::constant(metadata(), 10.0);
        provider.submit(request(1, 2)).unwrap();
        provider.submit(request(2, 5)).unwrap();
        assert_eq!(provider.pending_count(), 2);

        let responses = provider.drain_responses();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].ticket, Ticket(1));
        assert_eq!(responses[0].elevations, vec![10.0; 25]);
        assert!(responses[1].elevations.is_empty());
        assert!(provider.drain_responses().is_empty());
    }

    #[test]
    fn test_cancel_drops_pending() {
        let provider = SyncTerrainProvider::constant(metadata(), 0.0);
        provider.submit(request(1, 2)).unwrap();
        provider.submit(request(2, 2)).unwrap();
        provider.cancel(Ticket(1));
        let responses = provider.drain_responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].ticket, Ticket(2));
    }

    #[test]
    fn test_capacity_rejects_overflow() {
        let provider = SyncTerrainProvider::constant(metadata(), 0.0).with_capacity(1);
        assert!(provider.submit(request(1, 2)).is_ok());
        let rejected = provider.submit(request(2, 2)).unwrap_err();
        assert_eq!(rejected.ticket, Ticket(2));
    }

    #[test]
    fn test_closure_sees_key() {
        let provider = SyncTerrainProvider::new(metadata(), |key, _| vec![f32::from(key.zoom); 25]);
        provider.submit(request(1, 3)).unwrap();
        assert_eq!(provider.drain_responses()[0].elevations[0], 3.0);
    }
}
