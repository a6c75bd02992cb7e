pub mod fetcher;
pub mod notifier;

pub use fetcher::ListingFetcher;
pub use notifier::Mailer;
