//! Local-midnight rollover timer.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::day;
use crate::engine::Engine;
use crate::store::KvStore;

/// Spawn the rollover task: sleep until shortly after the next local
/// midnight, heal the progress record, re-arm.
///
/// Safe to run alongside load-time rollover; both converge on the same
/// record for the new day.
pub fn spawn_rollover<S: KvStore + 'static>(engine: Arc<Engine<S>>) -> tokio::task::JoinHandle<()> {
  tokio::spawn(async move {
    loop {
      let delay = day::delay_until_rollover();
      debug!("Next rollover check in {:?}", delay);
      tokio::time::sleep(delay).await;

      if let Err(e) = engine.rollover_check() {
        warn!("Midnight rollover check failed: {}", e);
      }
    }
  })
}
