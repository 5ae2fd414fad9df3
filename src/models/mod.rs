pub mod deal;
pub mod listing;
pub mod profile;

// Re-exports for convenience
pub use deal::*;
pub use listing::*;
pub use profile::*;
