use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels `cancelation` on Ctrl-C. Returns without waiting for the signal once something else
/// cancels it.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    info!("Received Ctrl-C, shutting down");
                    cancelation.cancel();
                }
                Err(e) => {
                    warn!("Can't listen for Ctrl-C {e:?}");
                    cancelation.cancelled().await;
                }
            }
        },
        _ = cancelation.cancelled() => (),
    };
}
