mod argon2_hasher;
mod auth_service_impl;
mod jwt_codec;
mod rotation_engine;
mod session_issuer;

pub use argon2_hasher::*;
pub use auth_service_impl::*;
pub use jwt_codec::*;
pub use rotation_engine::*;
pub use session_issuer::*;
