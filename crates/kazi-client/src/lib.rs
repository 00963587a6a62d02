pub mod boards;
pub mod cleaner;
pub mod fetcher;
pub mod llm;

pub use boards::{BoardConfig, JobBoard, ListingScraper, listing_schema};
pub use cleaner::ListingCleaner;
pub use fetcher::ReqwestFetcher;
pub use llm::OpenAiClient;
