pub mod render;
pub mod routes;

pub use routes::build_router;
