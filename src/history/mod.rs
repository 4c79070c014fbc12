pub mod buckets;
pub mod chunk;
pub mod config;
pub mod enumerate;
pub mod format;
pub mod manifest;
pub mod pipeline;
pub mod plan;
pub mod probe;
pub mod scheduler;
pub mod source;
#[cfg(test)]
pub mod testing;
pub mod util;
