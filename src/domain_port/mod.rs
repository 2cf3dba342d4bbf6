mod account_directory;
mod refresh_token_store;

pub use account_directory::*;
pub use refresh_token_store::*;
