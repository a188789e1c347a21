use crate::{
    error::{AppError, Result},
    models::{
        comment::*,
        feed::{Page, PageRequest},
        user::User,
    },
    services::store::PromoStore,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn PromoStore>,
}

impl CommentService {
    pub fn new(store: Arc<dyn PromoStore>) -> Self {
        Self { store }
    }

    pub async fn add_comment(
        &self,
        user_id: Uuid,
        promo_id: Uuid,
        request: CommentRequest,
    ) -> Result<CommentResponse> {
        debug!("Creating comment for promo: {} by user: {}", promo_id, user_id);

        request.validate()?;
        self.ensure_promo(promo_id).await?;

        let author = self.author(user_id).await?;

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            promo_id,
            user_id,
            text: request.text,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_comment(&comment).await?;

        info!("Comment {} added to promo {}", comment.id, promo_id);
        Ok(CommentResponse::new(&comment, Author::from(&author)))
    }

    pub async fn get_comments(
        &self,
        promo_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<CommentResponse>> {
        debug!("Getting comments for promo: {}", promo_id);

        self.ensure_promo(promo_id).await?;
        let comments = self.store.list_comments(promo_id, page).await?;

        let mut author_ids: Vec<Uuid> = comments.items.iter().map(|c| c.user_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();
        let authors = self.store.users_by_ids(&author_ids).await?;

        let mut items = Vec::with_capacity(comments.items.len());
        for comment in &comments.items {
            let author = authors
                .get(&comment.user_id)
                .ok_or_else(|| AppError::internal("Comment author missing"))?;
            items.push(CommentResponse::new(comment, Author::from(author)));
        }

        Ok(Page {
            items,
            total: comments.total,
        })
    }

    pub async fn get_comment(&self, promo_id: Uuid, comment_id: Uuid) -> Result<CommentResponse> {
        let comment = self.comment_of_promo(promo_id, comment_id).await?;
        let author = self.author(comment.user_id).await?;
        Ok(CommentResponse::new(&comment, Author::from(&author)))
    }

    pub async fn edit_comment(
        &self,
        user_id: Uuid,
        promo_id: Uuid,
        comment_id: Uuid,
        request: CommentRequest,
    ) -> Result<CommentResponse> {
        request.validate()?;

        let mut comment = self.comment_of_promo(promo_id, comment_id).await?;
        if comment.user_id != user_id {
            return Err(AppError::no_access("You can only edit your own comments"));
        }

        comment.text = request.text;
        comment.updated_at = Utc::now();
        self.store.update_comment(&comment).await?;

        let author = self.author(user_id).await?;
        Ok(CommentResponse::new(&comment, Author::from(&author)))
    }

    pub async fn delete_comment(&self, user_id: Uuid, promo_id: Uuid, comment_id: Uuid) -> Result<()> {
        let comment = self.comment_of_promo(promo_id, comment_id).await?;
        if comment.user_id != user_id {
            return Err(AppError::no_access("You can only delete your own comments"));
        }

        self.store.delete_comment(comment_id).await?;
        info!("Comment {} deleted from promo {}", comment_id, promo_id);
        Ok(())
    }

    async fn ensure_promo(&self, promo_id: Uuid) -> Result<()> {
        self.store
            .get_promo(promo_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("Promo"))
    }

    /// A comment filed under another promo is reported as missing.
    async fn comment_of_promo(&self, promo_id: Uuid, comment_id: Uuid) -> Result<Comment> {
        self.ensure_promo(promo_id).await?;

        self.store
            .get_comment(comment_id)
            .await?
            .filter(|c| c.promo_id == promo_id)
            .ok_or_else(|| AppError::not_found("Comment"))
    }

    async fn author(&self, user_id: Uuid) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }
}
