mod account;
mod token;

pub use account::*;
pub use token::*;
