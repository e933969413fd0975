//! Shared application state injected into every handler.

use joblib::JobRegistry;

pub struct AppState {
    pub registry: JobRegistry,
}
