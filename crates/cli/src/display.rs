//! Prints telemetry updates to stdout.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use reelpress_core::{ConvertedArtifact, Observable, RecordingArtifact, SessionTelemetry};

/// Spawn one printer task per observable value.
///
/// The tasks end once every handle to the observables is dropped; callers
/// abort them on exit.
pub fn spawn_printers(telemetry: &SessionTelemetry) -> Vec<JoinHandle<()>> {
    vec![
        watch(&telemetry.status, |s| Some(format!("[status] {}", s))),
        watch(&telemetry.conversion_time, |t| {
            (!t.is_empty()).then(|| format!("[time]{}", t))
        }),
        watch(&telemetry.duration, |secs| {
            (secs > 0).then(|| format!("[recording] {}", format_duration(secs)))
        }),
        watch(&telemetry.file_size_before, |s| {
            (!s.is_empty()).then(|| format!("[original] {}", s))
        }),
        watch(&telemetry.original, |a| a.as_ref().map(describe_original)),
        watch(&telemetry.converted, |a| a.as_ref().map(describe_converted)),
        watch(&telemetry.recorder_state, |s| Some(format!("[recorder] {}", s))),
        watch(&telemetry.engine_state, |s| Some(format!("[engine] {}", s))),
        watch(&telemetry.execution_mode, |m| Some(format!("[mode] {}", m))),
    ]
}

fn watch<T, F>(observable: &Observable<T>, render: F) -> JoinHandle<()>
where
    T: Clone + Send + 'static,
    F: Fn(T) -> Option<String> + Send + 'static,
{
    let mut rx = observable.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(value) => {
                    if let Some(line) = render(value) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "Printer lagged behind telemetry");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// `mm:ss` rendering of the recording counter.
pub fn format_duration(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn describe_original(artifact: &RecordingArtifact) -> String {
    format!(
        "[original] {} bytes, {} chunks ({})",
        artifact.size_bytes, artifact.chunk_count, artifact.media_type
    )
}

fn describe_converted(artifact: &ConvertedArtifact) -> String {
    format!(
        "[converted] {} bytes ({}), use 'save <path>' to write it",
        artifact.size_bytes, artifact.media_type
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(7), "00:07");
        assert_eq!(format_duration(61), "01:01");
        assert_eq!(format_duration(600), "10:00");
    }

    #[test]
    fn test_describe_converted() {
        let artifact = ConvertedArtifact::new(vec![1u8; 3].into());
        let line = describe_converted(&artifact);
        assert!(line.starts_with("[converted] 3 bytes (video/mp4)"));
    }

    #[tokio::test]
    async fn test_printer_ends_when_observable_dropped() {
        let observable = Observable::new(String::new());
        let handle = watch(&observable, Some);

        observable.set("hello".to_string());
        drop(observable);

        handle.await.unwrap();
    }
}
