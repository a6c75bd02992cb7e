pub mod config;
pub mod diff;
pub mod identity;
pub mod models;
pub mod monitor;
pub mod notifications;
pub mod plugins;
pub mod scraper;
pub mod service;
pub mod stores;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use diff::{CheckMode, DiffEngine};
pub use identity::IdentityExtractor;
pub use monitor::{LoopState, MonitorLoop};
pub use notifications::{DeliveryReport, NotificationBatch, NotificationScheduler};
pub use service::{CheckReport, WatcherService};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
