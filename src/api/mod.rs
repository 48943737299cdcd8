pub mod auth;
pub mod library;
pub mod middleware;

pub use auth::auth_routes;
pub use library::library_routes;
