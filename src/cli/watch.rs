use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{render::render_calendar, CalendarApp};
use crate::{sources::SourcesChanged, utils::clock::Clock};

/// Reloads the snapshot every `interval` and prints the calendar again, until `shutdown` is
/// cancelled. Cancels `shutdown` itself when it returns.
pub async fn watch(
    mut app: CalendarApp,
    clock: Box<dyn Clock>,
    interval: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    let _guard = shutdown.clone().drop_guard();
    let mut changes = BroadcastStream::new(app.feed.subscribe_sources_changed()?);

    print!("{}", render_calendar(&app.projector)?);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Stopped watching {:?}", app.feed.path());
                return Ok(());
            }
            Some(change) = changes.next() => match change {
                Ok(change) => log_change(&change),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("Missed {skipped} source change notifications");
                }
            },
            _ = clock.sleep(interval) => {
                if let Err(e) = app.feed.reload().await {
                    warn!("Keeping the previous snapshot {e:?}");
                }
                app.sync();
                println!();
                print!("{}", render_calendar(&app.projector)?);
            }
        }
    }
}

fn log_change(change: &SourcesChanged) {
    for (source, records) in change.changed.iter() {
        let total = change.all.get(source).map_or(0, |all| all.len());
        info!("Source {source}: {} of {total} records changed {records:?}", records.len());
    }
}
