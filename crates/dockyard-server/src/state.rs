//! The shared handle every handler receives: a thin, cheaply-cloneable
//! wrapper over [`dockyard_core::Context`], monomorphized over
//! [`BollardEngine`] for this binary — see `dockyard-core`'s `context`
//! module for why the container engine can't be a trait object.

use std::sync::Arc;

use dockyard_core::Context;
use dockyard_runtime::BollardEngine;

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<Context<BollardEngine>>,
}

impl AppState {
    pub fn new(ctx: Context<BollardEngine>) -> Self {
        Self { ctx: Arc::new(ctx) }
    }
}
