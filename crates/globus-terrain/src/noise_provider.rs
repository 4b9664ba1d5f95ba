//! Background terrain provider backed by a worker pool.
//!
//! Requests go to worker threads over a bounded channel; each carries a
//! cancellation flag so tiles pruned from the quadtree are skipped. Finished
//! tiles come back on a second bounded channel drained by the render thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};
use dashmap::DashMap;
use globus_math::{Extent, inverse_mercator};

use crate::heightmap::{HeightmapParams, HeightmapSampler};
use crate::provider::TerrainProvider;
use crate::tile::{TerrainMetadata, TerrainRequest, TerrainResponse, Ticket};

struct PendingRequest {
    request: TerrainRequest,
    cancelled: Arc<AtomicBool>,
}

/// Procedural terrain provider generating fBm tiles on worker threads.
pub struct NoiseTerrainProvider {
    metadata: TerrainMetadata,
    request_sender: Sender<PendingRequest>,
    response_receiver: Receiver<TerrainResponse>,
    active: Arc<DashMap<Ticket, Arc<AtomicBool>>>,
    in_flight: Arc<AtomicU64>,
}

impl NoiseTerrainProvider {
    /// Spawn `thread_count` workers accepting up to `max_concurrent` queued requests.
    pub fn new(
        metadata: TerrainMetadata,
        params: HeightmapParams,
        thread_count: usize,
        max_concurrent: usize,
    ) -> std::io::Result<Self> {
        let (request_sender, request_receiver) = bounded::<PendingRequest>(max_concurrent.max(1));
        let (response_sender, response_receiver) =
            bounded::<TerrainResponse>(max_concurrent.max(1) * 2);
        let in_flight = Arc::new(AtomicU64::new(0));
        let sampler = Arc::new(HeightmapSampler::new(params));

        for index in 0..thread_count.max(1) {
            let receiver = request_receiver.clone();
            let sender = response_sender.clone();
            let in_flight = Arc::clone(&in_flight);
            let sampler = Arc::clone(&sampler);
            let file_grid_size = metadata.file_grid_size;
            let max_zoom = metadata.max_zoom;

            std::thread::Builder::new()
                .name(format!("terrain-worker-{index}"))
                .spawn(move || {
                    while let Ok(pending) = receiver.recv() {
                        if pending.cancelled.load(Ordering::Relaxed) {
                            in_flight.fetch_sub(1, Ordering::Relaxed);
                            continue;
                        }

                        let request = pending.request;
                        let elevations = if request.key.zoom > max_zoom {
                            Vec::new()
                        } else {
                            generate_tile_sync(&sampler, &request.extent, file_grid_size)
                        };

                        if !pending.cancelled.load(Ordering::Relaxed) {
                            let _ = sender.send(TerrainResponse {
                                ticket: request.ticket,
                                key: request.key,
                                elevations,
                            });
                        }

                        in_flight.fetch_sub(1, Ordering::Relaxed);
                    }
                    tracing::debug!("Terrain worker {index} exiting");
                })?;
        }

        tracing::info!(
            "Started {} terrain workers (file grid {})",
            thread_count.max(1),
            metadata.file_grid_size
        );

        Ok(Self {
            metadata,
            request_sender,
            response_receiver,
            active: Arc::new(DashMap::new()),
            in_flight,
        })
    }

    /// A provider with a worker count derived from the CPU count.
    pub fn with_defaults(metadata: TerrainMetadata, params: HeightmapParams) -> std::io::Result<Self> {
        let cpus = num_cpus::get().max(2);
        let threads = (cpus - 2).max(1);
        Self::new(metadata, params, threads, 64)
    }

    /// Requests queued or executing.
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Returns `true` if the ticket has not been answered or cancelled.
    pub fn is_pending(&self, ticket: Ticket) -> bool {
        self.active.contains_key(&ticket)
    }
}

impl TerrainProvider for NoiseTerrainProvider {
    fn metadata(&self) -> &TerrainMetadata {
        &self.metadata
    }

    fn submit(&self, request: TerrainRequest) -> Result<(), TerrainRequest> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let ticket = request.ticket;
        self.active.insert(ticket, Arc::clone(&cancelled));
        self.in_flight.fetch_add(1, Ordering::Relaxed);

        self.request_sender
            .try_send(PendingRequest { request, cancelled })
            .map_err(|e| {
                self.in_flight.fetch_sub(1, Ordering::Relaxed);
                self.active.remove(&ticket);
                e.into_inner().request
            })
    }

    fn cancel(&self, ticket: Ticket) {
        if let Some((_, cancelled)) = self.active.remove(&ticket) {
            cancelled.store(true, Ordering::Relaxed);
        }
    }

    fn drain_responses(&self) -> Vec<TerrainResponse> {
        let mut responses = Vec::new();
        while let Ok(response) = self.response_receiver.try_recv() {
            // A response that raced a cancel is dropped here.
            if self.active.remove(&response.ticket).is_some() {
                responses.push(response);
            }
        }
        responses
    }
}

/// Sample one tile: `(file_grid_size + 1)^2` heights, row-major from the
/// north-west corner, evenly spaced in projected space.
pub fn generate_tile_sync(sampler: &HeightmapSampler, extent: &Extent, file_grid_size: u32) -> Vec<f32> {
    let g = file_grid_size.max(1);
    let side = g as usize + 1;
    let dx = extent.width() / f64::from(g);
    let dy = extent.height() / f64::from(g);
    let mut out = Vec::with_capacity(side * side);
    for i in 0..side {
        let y = extent.north_east.y - i as f64 * dy;
        for j in 0..side {
            let x = extent.south_west.x + j as f64 * dx;
            out.push(sampler.sample_lonlat(inverse_mercator(x, y)) as f32);
        }
    }
    out
}
