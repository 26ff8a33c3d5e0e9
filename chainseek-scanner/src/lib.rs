pub mod crawler;
pub mod error;
pub mod fetch;
pub mod matcher;
pub mod result;
pub mod state;

pub use crawler::{
    CrawlEngine, CrawlSummary, MatchCallback, Pacing, ProgressCallback, ScheduleMode, SharedState,
};
pub use error::ScanError;
pub use fetch::{ChainFetcher, HttpChainClient, IdentityResolver};
pub use matcher::KeywordMatcher;
pub use result::{MatchRecord, NeighborDescriptor, NodeId};
pub use state::{CrawlState, DedupPolicy, MatchStore, VisitedSet};
