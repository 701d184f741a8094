pub mod cookies;
pub mod error;
pub mod passwords;
pub mod session;
