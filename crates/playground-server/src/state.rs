//! Shared application state for the HTTP server.

use playground_core::{Context, HubHandle};

/// What every route handler can reach.
#[derive(Clone)]
pub struct AppState {
    /// Store, settings and secrets.
    pub ctx: Context,
    /// The process's hub.
    pub hub: HubHandle,
}

impl AppState {
    /// Bundle a context and the hub serving it.
    pub const fn new(ctx: Context, hub: HubHandle) -> Self {
        Self { ctx, hub }
    }
}
