// THEORY:
// Face detection is an external collaborator that runs at its own pace. The
// pipeline never waits for it; it simply reads whatever detection set was most
// recently delivered, even if that set is a frame or two stale.
//
// Key architectural principles:
// 1.  **Single-Slot Channel**: The "current detections" value is a `tokio::sync::watch`
//     channel. The detector task overwrites it, readers clone the latest `Arc`.
//     There is no queue, so a slow reader never causes a backlog.
// 2.  **Self-Driving Loop**: `spawn_detector_loop` re-runs the detector every time a
//     new capture frame is published, which is the async equivalent of a detector
//     that re-invokes itself on completion.
// 3.  **Collaborator Seam**: The model itself sits behind the `FaceDetector` trait,
//     so the pipeline can be tested with fixed boxes.

use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::core_modules::region::FaceDetection;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub type Detections = Arc<Vec<FaceDetection>>;
pub type DetectorError = Box<dyn std::error::Error + Send + Sync>;

/// Any face detector: given a capture frame, returns zero or more face boxes in the
/// frame's own coordinate space.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &PixelBuffer) -> Result<Vec<FaceDetection>, DetectorError>;
}

/// A detector that always reports the same boxes.
#[derive(Debug, Clone, Default)]
pub struct FixedDetector {
    pub boxes: Vec<FaceDetection>,
}

impl FixedDetector {
    pub fn new(boxes: Vec<FaceDetection>) -> Self {
        Self { boxes }
    }
}

impl FaceDetector for FixedDetector {
    fn detect(&mut self, _frame: &PixelBuffer) -> Result<Vec<FaceDetection>, DetectorError> {
        Ok(self.boxes.clone())
    }
}

/// Write half of the latest-detections slot.
#[derive(Debug, Clone)]
pub struct DetectionPublisher {
    tx: Arc<watch::Sender<Detections>>,
}

/// Read half of the latest-detections slot.
#[derive(Debug, Clone)]
pub struct DetectionReader {
    rx: watch::Receiver<Detections>,
}

pub fn latest_slot() -> (DetectionPublisher, DetectionReader) {
    let (tx, rx) = watch::channel(Detections::default());
    (DetectionPublisher { tx: Arc::new(tx) }, DetectionReader { rx })
}

impl DetectionPublisher {
    /// Replaces the current detection set. Succeeds even with no readers left.
    pub fn publish(&self, detections: Vec<FaceDetection>) {
        self.tx.send_replace(Arc::new(detections));
    }

    pub fn subscribe(&self) -> DetectionReader {
        DetectionReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl DetectionReader {
    /// The most recently delivered detection set.
    pub fn latest(&self) -> Detections {
        self.rx.borrow().clone()
    }

    /// Waits until a new set is published. `false` once the publisher is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Runs `detector` on every frame published to `frames`, writing results into
/// `publisher`. While `enabled` reads `false` frames are skipped and the previous
/// detections stay in place. A detector error is logged and the loop carries on.
/// The task ends when the frame sender is dropped.
pub fn spawn_detector_loop<D>(
    mut detector: D,
    mut frames: watch::Receiver<Option<Arc<PixelBuffer>>>,
    enabled: watch::Receiver<bool>,
    publisher: DetectionPublisher,
) -> JoinHandle<()>
where
    D: FaceDetector + 'static,
{
    tokio::spawn(async move {
        while frames.changed().await.is_ok() {
            if !*enabled.borrow() {
                continue;
            }
            let Some(frame) = frames.borrow_and_update().clone() else {
                continue;
            };
            match detector.detect(&frame) {
                Ok(found) => {
                    debug!(faces = found.len(), "face detection finished");
                    publisher.publish(found);
                }
                Err(err) => warn!(error = %err, "face detector failed, keeping previous detections"),
            }
        }
        debug!("frame source closed, stopping face detection");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(&mut self, _frame: &PixelBuffer) -> Result<Vec<FaceDetection>, DetectorError> {
            Err("model not loaded".into())
        }
    }

    fn frame() -> Option<Arc<PixelBuffer>> {
        Some(Arc::new(PixelBuffer::filled(4, 4, [0, 0, 0, 255]).unwrap()))
    }

    #[test]
    fn slot_keeps_only_the_latest_value() {
        let (publisher, reader) = latest_slot();
        assert!(reader.latest().is_empty());
        publisher.publish(vec![FaceDetection::new(0.0, 0.0, 1.0, 1.0)]);
        publisher.publish(vec![
            FaceDetection::new(1.0, 1.0, 2.0, 2.0),
            FaceDetection::new(5.0, 5.0, 2.0, 2.0),
        ]);
        assert_eq!(reader.latest().len(), 2);
        assert_eq!(publisher.subscribe().latest().len(), 2);
    }

    #[tokio::test]
    async fn loop_publishes_detections_for_each_frame() {
        let boxes = vec![FaceDetection::new(10.0, 20.0, 30.0, 40.0)];
        let (frame_tx, frame_rx) = watch::channel(None);
        let (_enabled_tx, enabled_rx) = watch::channel(true);
        let (publisher, mut reader) = latest_slot();

        let handle = spawn_detector_loop(FixedDetector::new(boxes.clone()), frame_rx, enabled_rx, publisher);
        frame_tx.send_replace(frame());
        assert!(reader.changed().await);
        assert_eq!(*reader.latest(), boxes);

        drop(frame_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn disabled_loop_leaves_detections_untouched() {
        let (frame_tx, frame_rx) = watch::channel(None);
        let (_enabled_tx, enabled_rx) = watch::channel(false);
        let (publisher, reader) = latest_slot();

        let handle = spawn_detector_loop(
            FixedDetector::new(vec![FaceDetection::new(0.0, 0.0, 5.0, 5.0)]),
            frame_rx,
            enabled_rx,
            publisher,
        );
        frame_tx.send_replace(frame());
        drop(frame_tx);
        handle.await.unwrap();
        assert!(reader.latest().is_empty());
    }

    #[tokio::test]
    async fn detector_errors_do_not_stop_the_loop() {
        let (frame_tx, frame_rx) = watch::channel(None);
        let (_enabled_tx, enabled_rx) = watch::channel(true);
        let (publisher, reader) = latest_slot();
        publisher.publish(vec![FaceDetection::new(1.0, 1.0, 1.0, 1.0)]);

        let handle = spawn_detector_loop(FailingDetector, frame_rx, enabled_rx, publisher);
        frame_tx.send_replace(frame());
        drop(frame_tx);
        handle.await.unwrap();
        assert_eq!(reader.latest().len(), 1);
    }
}
