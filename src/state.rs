//! Application state management
//!
//! Contains shared state accessible across all handlers. Collaborators are
//! injected as trait objects, so tests can run the full router on fakes.

use crate::catalog::{PermissionChecker, SharedCatalog};
use crate::config::Settings;
use crate::generation::{GenerationOrchestrator, RateLimiter};
use crate::governance::{ApplyReconciler, ReviewGateway, SharedStore};
use crate::llm::SharedGenerator;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,

    /// Governance record storage
    pub store: SharedStore,

    /// Metadata catalog the descriptions are generated for and written to
    pub catalog: SharedCatalog,

    pub orchestrator: GenerationOrchestrator,
    pub reviews: ReviewGateway,
    pub reconciler: ApplyReconciler,
    pub permissions: PermissionChecker,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: SharedStore,
        catalog: SharedCatalog,
        generator: SharedGenerator,
    ) -> Self {
        // One limiter for the whole process so concurrent batches share the ceiling
        let limiter = Arc::new(RateLimiter::per_second(settings.generator.requests_per_second));

        Self {
            orchestrator: GenerationOrchestrator::new(
                catalog.clone(),
                generator,
                store.clone(),
                limiter,
            ),
            reviews: ReviewGateway::new(store.clone()),
            reconciler: ApplyReconciler::new(
                catalog.clone(),
                store.clone(),
                settings.governance.max_apply_attempts,
            ),
            permissions: PermissionChecker::new(catalog.clone()),
            settings,
            store,
            catalog,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
