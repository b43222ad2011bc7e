mod jwt_middleware;
mod logging;

pub use jwt_middleware::JwtMiddleware;
pub use logging::RequestLogging;
