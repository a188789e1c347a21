use std::sync::Arc;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::feed::PageRequest,
    services::{
        AuthService, CommentService, FeedService, LikeService, PromoService, PromoStore,
        RedemptionService,
    },
};

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 认证服务
    pub auth_service: AuthService,

    /// 推送流服务
    pub feed_service: FeedService,

    /// 点赞服务
    pub like_service: LikeService,

    /// 兑换服务
    pub redemption_service: RedemptionService,

    /// 评论服务
    pub comment_service: CommentService,

    /// 商家促销服务
    pub promo_service: PromoService,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn PromoStore>) -> Self {
        Self {
            auth_service: AuthService::new(&config),
            feed_service: FeedService::new(store.clone()),
            like_service: LikeService::new(store.clone()),
            redemption_service: RedemptionService::new(store.clone()),
            comment_service: CommentService::new(store.clone()),
            promo_service: PromoService::new(store),
            config,
        }
    }

    /// 获取分页配置
    ///
    /// Missing values fall back to the configured defaults; the limit is
    /// capped at `max_page_size`.
    pub fn page_request(&self, limit: Option<i64>, offset: Option<i64>) -> Result<PageRequest> {
        if limit.is_some_and(|l| l < 0) || offset.is_some_and(|o| o < 0) {
            return Err(AppError::validation("limit and offset must not be negative"));
        }
        let limit = limit
            .unwrap_or(self.config.default_page_size)
            .min(self.config.max_page_size);
        Ok(PageRequest::new(limit, offset.unwrap_or(0)))
    }
}
