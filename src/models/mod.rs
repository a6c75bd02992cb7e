pub mod listing;
pub mod status;
pub mod subscriber;

// Re-exports for convenience
pub use listing::*;
pub use status::*;
pub use subscriber::*;
