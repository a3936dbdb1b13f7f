//! Live status line

use crate::state::ProgressTracker;
use std::io::Write;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Shortest sampling interval; `tokio::time::interval` rejects zero
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Background task that rewrites one terminal line with the current progress
pub struct StatusRenderer {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl StatusRenderer {
    /// Starts sampling `tracker` every `interval`
    pub fn spawn(tracker: ProgressTracker, interval: Duration) -> Self {
        let (stop, mut stopped) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => render(&tracker.snapshot().status_line()),
                }
            }
            // Last frame, then release the line
            render(&tracker.snapshot().status_line());
            println!();
        });

        Self { stop, handle }
    }

    /// Stops the renderer after drawing a final frame
    pub async fn stop(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            tracing::warn!("Status renderer ended abnormally: {}", e);
        }
    }
}

fn render(line: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "\r{}", line);
    let _ = stdout.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_renderer_stops_cleanly() {
        let (tracker, _discovering) = ProgressTracker::start(3, 1);
        let renderer = StatusRenderer::spawn(tracker, Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        renderer.stop().await;
    }

    #[tokio::test]
    async fn test_zero_interval_is_clamped() {
        let (tracker, _discovering) = ProgressTracker::start(3, 1);
        let renderer = StatusRenderer::spawn(tracker, Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!renderer.handle.is_finished());
        renderer.stop().await;
    }
}
