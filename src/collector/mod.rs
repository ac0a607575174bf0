//! Feed collection: paging through windows and storing what comes back.

mod fetcher;
mod persister;
pub mod traits;

pub use fetcher::PaginatedFetcher;
pub use persister::DedupPersister;
pub use traits::{ActivityStore, FeedPage, FeedQuery, RejectedTransaction, TransferFeed};
