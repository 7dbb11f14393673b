//! The explicitly constructed context shared by the hub, bus, ticker and
//! REST handlers.

use std::sync::Arc;

use playground_db::Store;
use playground_types::IngestId;

use crate::clock::{Clock, SystemClock};
use crate::config::{Secrets, Settings};
use crate::services::Services;

/// Everything a component needs from the outside world.
///
/// Cloning is cheap; every field is shared.
#[derive(Clone)]
pub struct Context {
    /// Shared store.
    pub store: Arc<dyn Store>,
    /// This process.
    pub ingest: IngestId,
    /// Loaded settings.
    pub settings: Arc<Settings>,
    /// Credentials.
    pub secrets: Arc<Secrets>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Outbound collaborators.
    pub services: Services,
}

impl Context {
    /// A context on the system clock.
    pub fn new(
        store: Arc<dyn Store>,
        ingest: IngestId,
        settings: Settings,
        secrets: Secrets,
        services: Services,
    ) -> Self {
        Self {
            store,
            ingest,
            settings: Arc::new(settings),
            secrets: Arc::new(secrets),
            clock: Arc::new(SystemClock),
            services,
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
