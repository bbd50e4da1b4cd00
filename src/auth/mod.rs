mod jwt;
mod middleware;
mod password;

pub use jwt::{Claims, sign_token, verify_token};
pub use middleware::{AuthError, RequireUser};
pub use password::{hash_password, verify_password};
