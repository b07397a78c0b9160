use tokio::select;
use tokio_util::sync::CancellationToken;

/// Detects signals sent to the process, or the end of the event input cancelling the token first.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
