pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod model;

mod tests;

pub use handlers::*;
pub use jwt::*;
pub use middleware::*;
pub use model::*;
