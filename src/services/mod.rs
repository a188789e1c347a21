pub mod auth;
pub mod comment;
pub mod database;
pub mod eligibility;
pub mod feed;
pub mod lifecycle;
pub mod likes;
pub mod memory;
pub mod promo;
pub mod redemption;
pub mod stats;
pub mod store;

// 重新导出常用类型
pub use auth::AuthService;
pub use comment::CommentService;
pub use database::Database;
pub use feed::FeedService;
pub use likes::LikeService;
pub use memory::MemoryStore;
pub use promo::PromoService;
pub use redemption::RedemptionService;
pub use stats::StatsService;
pub use store::PromoStore;
