pub mod client;
pub mod credentials;
pub mod types;
