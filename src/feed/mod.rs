pub mod assembler;
pub mod filter;
pub mod reshuffle;

pub use assembler::{
    rank_organized, rank_smart, rank_tabbed, FeedAssembler, FeedMode, FeedPage, FeedQuery,
    Pagination, Personalization, RankedPost,
};
pub use filter::{sub_tab_tags, FeedFilter};
pub use reshuffle::{ReshuffleEligibility, ReshuffleStatistics, ReshuffleTracker};
