// HTTP controller trait for route registration.

use axum::Router;

/// Trait for adding routes to the HTTP server.
pub trait Controller: Send + Sync {
    /// Adds this controller's routes to the router.
    fn add_route(&self, router: Router) -> Router;
}
