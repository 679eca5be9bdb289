// THEORY:
// Views are pure functions of (base buffer, config, detections), so a frame's views
// can be evaluated in any order and on any thread. `ParallelPipeline` fans the views
// of a frame out to a fixed pool of worker tasks and gathers the answers back in page
// order. The base buffer and detection set are shared read-only through `Arc`s.
//
// A dispatcher task deals tasks round-robin to the workers; each worker owns a clone
// of the stateless `VisionPipeline`. Results come back over per-task oneshot
// channels, and failures stay confined to the view that produced them.

use crate::core_modules::detection::DetectionReader;
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::core_modules::region::FaceDetection;
use crate::error::{PipelineError, Result};
use crate::pipeline::{FrameReport, PipelineConfig, View, ViewImage, VisionPipeline};
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub struct ViewTask {
    pub view: View,
    pub base: Arc<PixelBuffer>,
    pub detections: Arc<Vec<FaceDetection>>,
    pub result_sender: oneshot::Sender<Result<ViewImage>>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<ViewTask>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` workers (at least one). Must be called inside a tokio runtime.
    pub fn new(pipeline: VisionPipeline, size: usize) -> Self {
        let size = size.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<ViewTask>();
        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| mpsc::unbounded_channel::<ViewTask>()).unzip();

        tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if worker_senders[worker_idx].send(task).is_err() {
                    warn!(worker = worker_idx, "worker stopped, dropping view task");
                }
                worker_idx = (worker_idx + 1) % size;
            }
        });

        let workers = worker_receivers
            .into_iter()
            .map(|mut worker_receiver| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    while let Some(task) = worker_receiver.recv().await {
                        let result = pipeline.render(task.view, &task.base, &task.detections);
                        // The caller may have given up on this frame.
                        let _ = task.result_sender.send(result);
                    }
                })
            })
            .collect();

        Self { task_sender, workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub async fn render(
        &self,
        view: View,
        base: Arc<PixelBuffer>,
        detections: Arc<Vec<FaceDetection>>,
    ) -> Result<ViewImage> {
        let (result_sender, result_receiver) = oneshot::channel();
        let task = ViewTask {
            view,
            base,
            detections,
            result_sender,
        };
        self.task_sender
            .send(task)
            .map_err(|_| PipelineError::WorkerUnavailable)?;
        result_receiver
            .await
            .map_err(|_| PipelineError::WorkerUnavailable)?
    }
}

pub struct ParallelPipeline {
    pipeline: VisionPipeline,
    worker_pool: WorkerPool,
    detections: Option<DetectionReader>,
    frame_counter: AtomicU64,
}

impl ParallelPipeline {
    /// One worker per logical CPU.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_workers(config, num_cpus::get())
    }

    pub fn with_workers(config: PipelineConfig, workers: usize) -> Result<Self> {
        let pipeline = VisionPipeline::new(config)?;
        let worker_pool = WorkerPool::new(pipeline.clone(), workers);
        Ok(Self {
            pipeline,
            worker_pool,
            detections: None,
            frame_counter: AtomicU64::new(0),
        })
    }

    /// Reads face detections from `reader` on every frame instead of taking them as
    /// an argument.
    pub fn with_detections(mut self, reader: DetectionReader) -> Self {
        self.detections = Some(reader);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_pool.size()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    /// Downscales `capture` to the working size and renders every view, using the
    /// latest detections from the attached reader (none if no reader is attached).
    pub async fn process_capture(&self, capture: &PixelBuffer) -> Result<FrameReport> {
        let base = self.pipeline.prepare_base(capture)?;
        let detections = self
            .detections
            .as_ref()
            .map(DetectionReader::latest)
            .unwrap_or_default();
        Ok(self.process_frame(Arc::new(base), detections).await)
    }

    /// Renders every view of one already-prepared base buffer concurrently.
    pub async fn process_frame(
        &self,
        base: Arc<PixelBuffer>,
        detections: Arc<Vec<FaceDetection>>,
    ) -> FrameReport {
        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let pending = View::ALL.iter().map(|&view| {
            let base = Arc::clone(&base);
            let detections = Arc::clone(&detections);
            async move { (view, self.worker_pool.render(view, base, detections).await) }
        });
        let views = join_all(pending).await;

        let report = FrameReport { views };
        for (view, result) in &report.views {
            if let Err(err) = result {
                warn!(frame_id, view = view.slug(), error = %err, "view failed to render");
            }
        }
        debug!(frame_id, failures = report.failures(), "frame rendered");
        report
    }
}
