pub mod config;
pub mod dedup;
pub mod models;
pub mod plugins;
pub mod price;
pub mod qualifier;
pub mod scheduler;
pub mod utils;

// Re-export commonly used types
pub use crate::config::AppConfig;
pub use dedup::{DedupFilter, InMemorySeenStore, SeenStore};
pub use models::{Deal, Listing, ListingId, PricingProfile};
pub use qualifier::DealQualifier;
pub use scheduler::{CycleReport, LoopSettings, LoopState, PollLoop};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
