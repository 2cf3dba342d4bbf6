mod account_directory_memory;
mod refresh_token_store_memory;

pub use account_directory_memory::*;
pub use refresh_token_store_memory::*;
