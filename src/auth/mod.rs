mod claims;
mod extractor;
mod jwt;

pub use claims::Claims;
pub use extractor::{bearer_token, query_token, AuthUser};
pub use jwt::JwtValidator;
