pub mod answer_routes;
pub mod health_routes;

pub use answer_routes::*;
pub use health_routes::*;
