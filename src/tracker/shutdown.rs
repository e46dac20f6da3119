use tokio::select;
use tokio_util::sync::CancellationToken;

/// Detects signals sent to the process, or returns once the tracker shuts down by itself.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
