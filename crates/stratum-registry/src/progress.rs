//! Download progress sampling.
//!
//! A [`ProgressObserver`] is an independent background task bound to one
//! destination file and one expected total size. It shares no memory with
//! the transfer writing that file; coordination happens solely through the
//! filesystem, so the observer may see the file in any state from "not yet
//! created" to "fully written" and tolerates both.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Sampling interval between progress reports.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// A cancellable background task reporting transfer completion percentage.
///
/// The task terminates on its own when the sampled size reaches the expected
/// size, exits silently if the file cannot be statted, and stops promptly
/// when [`finish`](Self::finish) is called by the foreground transfer.
#[derive(Debug)]
pub struct ProgressObserver {
    stop: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressObserver {
    /// Spawns an observer for a destination file and its expected size.
    #[must_use]
    pub fn spawn(path: PathBuf, expected: u64) -> Self {
        let (stop, stopped) = watch::channel(false);
        let handle = tokio::spawn(Self::sample_loop(path, expected, stopped));
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Signals the observer to stop and waits for the task to exit.
    pub async fn finish(mut self) {
        let _ = self.stop.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Returns true once the sampling task has exited on its own.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    async fn sample_loop(path: PathBuf, expected: u64, mut stopped: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Stat failure means the file is not there yet (or gone);
                    // reporting is best-effort only, so exit silently.
                    let Ok(metadata) = tokio::fs::metadata(&path).await else {
                        return;
                    };
                    let current = metadata.len();
                    tracing::info!(
                        file = %path.display(),
                        "downloading... {current}/{expected} [{}/100 complete]",
                        percent(current, expected),
                    );
                    if current >= expected {
                        return;
                    }
                }
                _ = stopped.changed() => return,
            }
        }
    }
}

impl Drop for ProgressObserver {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Completion percentage, floored and capped at 100.
fn percent(current: u64, expected: u64) -> u64 {
    if expected == 0 {
        return 100;
    }
    (current.saturating_mul(100) / expected).min(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_percent_floors() {
        assert_eq!(percent(0, 100), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 66);
        assert_eq!(percent(3, 3), 100);
    }

    #[test]
    fn test_percent_caps_at_100() {
        assert_eq!(percent(250, 100), 100);
    }

    #[test]
    fn test_percent_zero_expected() {
        assert_eq!(percent(0, 0), 100);
    }

    /// Polls the observer until its task exits without sending the stop
    /// signal, so self-termination is what is actually exercised.
    async fn wait_for_self_exit(observer: &ProgressObserver) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !observer.is_finished() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "sampling task did not exit on its own"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_observer_exits_when_file_complete() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 64]).unwrap();
        file.flush().unwrap();

        let observer = ProgressObserver::spawn(file.path().to_path_buf(), 64);
        // First sample sees the full size; no stop signal is ever sent.
        wait_for_self_exit(&observer).await;
    }

    #[tokio::test]
    async fn test_observer_exits_silently_on_missing_file() {
        let observer = ProgressObserver::spawn(PathBuf::from("/nonexistent/blob"), 1024);
        wait_for_self_exit(&observer).await;
    }

    #[tokio::test]
    async fn test_observer_stops_on_finish_signal() {
        let file = tempfile::NamedTempFile::new().unwrap();

        // Empty file, large expected size: the task would keep sampling, but
        // the stop signal ends it promptly.
        let observer = ProgressObserver::spawn(file.path().to_path_buf(), u64::MAX);
        tokio::time::timeout(Duration::from_secs(5), observer.finish())
            .await
            .unwrap();
    }
}
