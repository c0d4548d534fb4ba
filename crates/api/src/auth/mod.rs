//! Authentication: JWT issuing/validation and the request guard

pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, JwtManager};
pub use middleware::{require_auth, AuthUser};
