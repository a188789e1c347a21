use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    types::Json,
    Executor, Postgres, QueryBuilder,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        activation::{ActivationTally, CountryActivation},
        comment::Comment,
        feed::{Page, PageRequest},
        like::{LikeAction, LikeOutcome},
        promo::{CompanyPromoQuery, Promo, PromoSortBy, Target},
        user::{Company, User},
    },
    services::{
        eligibility::EligibilityFilter,
        likes::LikeEffect,
        redemption::{decide, ActivationOutcome},
        store::PromoStore,
    },
};

/// 建表语句，启动时执行，可重复执行
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS companies (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    surname TEXT NOT NULL,
    avatar_url TEXT,
    age INT NOT NULL DEFAULT 0,
    country TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS promos (
    id UUID PRIMARY KEY,
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    description TEXT NOT NULL,
    image_url TEXT,
    mode TEXT NOT NULL CHECK (mode IN ('COMMON', 'UNIQUE')),
    promo_common TEXT,
    promo_unique TEXT[] NOT NULL DEFAULT '{}',
    target JSONB NOT NULL DEFAULT '{}'::jsonb,
    max_count INT NOT NULL DEFAULT 0,
    active_from DATE,
    active_until DATE,
    like_count INT NOT NULL DEFAULT 0 CHECK (like_count >= 0),
    used_count INT NOT NULL DEFAULT 0 CHECK (used_count >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS promos_company_idx ON promos (company_id);
CREATE INDEX IF NOT EXISTS promos_feed_idx ON promos (created_at DESC, id DESC);

CREATE TABLE IF NOT EXISTS user_likes (
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    promo_id UUID NOT NULL REFERENCES promos(id) ON DELETE CASCADE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (user_id, promo_id)
);

CREATE TABLE IF NOT EXISTS promo_activations (
    id UUID PRIMARY KEY,
    promo_id UUID NOT NULL REFERENCES promos(id) ON DELETE CASCADE,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    code TEXT NOT NULL,
    activated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (promo_id, user_id)
);

CREATE TABLE IF NOT EXISTS comments (
    id UUID PRIMARY KEY,
    promo_id UUID NOT NULL REFERENCES promos(id) ON DELETE CASCADE,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS comments_promo_idx ON comments (promo_id, created_at DESC);
"#;

const PROMO_COLUMNS: &str = "id, company_id, description, image_url, mode, promo_common, \
     promo_unique, target, max_count, active_from, active_until, like_count, used_count, created_at";

const COMMENT_COLUMNS: &str = "id, promo_id, user_id, text, created_at, updated_at";

const USER_COLUMNS: &str = "id, name, surname, avatar_url, age, country";

/// 多条读语句共用一个快照，保证总数与明细一致
const SNAPSHOT_READ: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY";

#[derive(sqlx::FromRow)]
struct PromoRow {
    id: Uuid,
    company_id: Uuid,
    description: String,
    image_url: Option<String>,
    mode: String,
    promo_common: Option<String>,
    promo_unique: Vec<String>,
    target: Json<Target>,
    max_count: i32,
    active_from: Option<NaiveDate>,
    active_until: Option<NaiveDate>,
    like_count: i32,
    used_count: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<PromoRow> for Promo {
    type Error = AppError;

    fn try_from(row: PromoRow) -> Result<Self> {
        Ok(Promo {
            id: row.id,
            company_id: row.company_id,
            description: row.description,
            image_url: row.image_url,
            mode: row.mode.parse()?,
            promo_common: row.promo_common,
            promo_unique: row.promo_unique,
            target: row.target.0,
            max_count: row.max_count,
            active_from: row.active_from,
            active_until: row.active_until,
            like_count: row.like_count,
            used_count: row.used_count,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    surname: String,
    avatar_url: Option<String>,
    age: i32,
    country: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            surname: row.surname,
            avatar_url: row.avatar_url,
            age: row.age,
            country: row.country,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    promo_id: Uuid,
    user_id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            promo_id: row.promo_id,
            user_id: row.user_id,
            text: row.text,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn into_promos(rows: Vec<PromoRow>) -> Result<Vec<Promo>> {
    rows.into_iter().map(Promo::try_from).collect()
}

/// 数据库服务
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    /// 创建新的数据库连接池
    pub async fn new(config: &Config) -> Result<Self> {
        info!(
            "Initializing PostgreSQL pool (max {} connections)",
            config.database_max_connections
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    /// 初始化表结构
    pub async fn migrate(&self) -> Result<()> {
        self.pool.execute(SCHEMA).await?;
        info!("Database schema is up to date");
        Ok(())
    }
}

fn push_company_filter(
    qb: &mut QueryBuilder<'_, Postgres>,
    company_id: Uuid,
    countries: &[String],
) {
    qb.push(" WHERE company_id = ");
    qb.push_bind(company_id);
    if !countries.is_empty() {
        let lowered: Vec<String> = countries.iter().map(|c| c.to_lowercase()).collect();
        qb.push(" AND (COALESCE(target->>'country', '') = '' OR LOWER(target->>'country') = ANY(");
        qb.push_bind(lowered);
        qb.push("))");
    }
}

fn company_order(sort_by: Option<PromoSortBy>) -> &'static str {
    match sort_by {
        Some(PromoSortBy::ActiveFrom) => {
            " ORDER BY active_from DESC NULLS LAST, created_at DESC, id DESC"
        }
        Some(PromoSortBy::ActiveUntil) => {
            " ORDER BY active_until DESC NULLS LAST, created_at DESC, id DESC"
        }
        None => " ORDER BY created_at DESC, id DESC",
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: PageRequest) {
    qb.push(" LIMIT ");
    qb.push_bind(page.limit);
    qb.push(" OFFSET ");
    qb.push_bind(page.offset);
}

#[async_trait]
impl PromoStore for Database {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, User>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!("SELECT {} FROM users WHERE id = ANY($1)", USER_COLUMNS);
        let rows: Vec<UserRow> = sqlx::query_as(&sql).bind(ids).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|r| (r.id, User::from(r))).collect())
    }

    async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>> {
        let row: Option<(Uuid, String)> =
            sqlx::query_as("SELECT id, name FROM companies WHERE id = $1")
                .bind(company_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, name)| Company { id, name }))
    }

    async fn company_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, name FROM companies WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn insert_promo(&self, promo: &Promo) -> Result<()> {
        sqlx::query(
            "INSERT INTO promos (id, company_id, description, image_url, mode, promo_common, \
             promo_unique, target, max_count, active_from, active_until, like_count, used_count, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(promo.id)
        .bind(promo.company_id)
        .bind(&promo.description)
        .bind(&promo.image_url)
        .bind(promo.mode.as_str())
        .bind(&promo.promo_common)
        .bind(promo.promo_unique.as_slice())
        .bind(Json(&promo.target))
        .bind(promo.max_count)
        .bind(promo.active_from)
        .bind(promo.active_until)
        .bind(promo.like_count)
        .bind(promo.used_count)
        .bind(promo.created_at)
        .execute(&self.pool)
        .await?;

        debug!("Inserted promo {}", promo.id);
        Ok(())
    }

    async fn get_promo(&self, promo_id: Uuid) -> Result<Option<Promo>> {
        let sql = format!("SELECT {} FROM promos WHERE id = $1", PROMO_COLUMNS);
        let row: Option<PromoRow> = sqlx::query_as(&sql)
            .bind(promo_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Promo::try_from).transpose()
    }

    async fn update_promo(&self, promo: &Promo) -> Result<()> {
        sqlx::query(
            "UPDATE promos SET description = $2, image_url = $3, target = $4, max_count = $5, \
             active_from = $6, active_until = $7 WHERE id = $1",
        )
        .bind(promo.id)
        .bind(&promo.description)
        .bind(&promo.image_url)
        .bind(Json(&promo.target))
        .bind(promo.max_count)
        .bind(promo.active_from)
        .bind(promo.active_until)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_company_promos(
        &self,
        company_id: Uuid,
        query: &CompanyPromoQuery,
    ) -> Result<Page<Promo>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(SNAPSHOT_READ).execute(&mut *tx).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM promos");
        push_company_filter(&mut count, company_id, &query.countries);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM promos", PROMO_COLUMNS));
        push_company_filter(&mut select, company_id, &query.countries);
        select.push(company_order(query.sort_by));
        push_page(&mut select, PageRequest::new(query.limit, query.offset));
        let rows: Vec<PromoRow> = select.build_query_as().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        Ok(Page {
            items: into_promos(rows)?,
            total,
        })
    }

    async fn find_feed(&self, filter: &EligibilityFilter, page: PageRequest) -> Result<Page<Promo>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(SNAPSHOT_READ).execute(&mut *tx).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM promos WHERE TRUE");
        filter.push_predicates(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM promos WHERE TRUE", PROMO_COLUMNS));
        filter.push_predicates(&mut select);
        select.push(" ORDER BY created_at DESC, id DESC");
        push_page(&mut select, page);
        let rows: Vec<PromoRow> = select.build_query_as().fetch_all(&mut *tx).await?;

        tx.commit().await?;

        Ok(Page {
            items: into_promos(rows)?,
            total,
        })
    }

    async fn liked_promo_ids(&self, user_id: Uuid, promo_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        if promo_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT promo_id FROM user_likes WHERE user_id = $1 AND promo_id = ANY($2)",
        )
        .bind(user_id)
        .bind(promo_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn activated_promo_ids(&self, user_id: Uuid, promo_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        if promo_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT promo_id FROM promo_activations WHERE user_id = $1 AND promo_id = ANY($2)",
        )
        .bind(user_id)
        .bind(promo_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn comment_counts(&self, promo_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        if promo_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT promo_id, COUNT(*) FROM comments WHERE promo_id = ANY($1) GROUP BY promo_id",
        )
        .bind(promo_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn apply_like(&self, user_id: Uuid, promo_id: Uuid, action: LikeAction) -> Result<LikeOutcome> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM promos WHERE id = $1")
            .bind(promo_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(LikeOutcome::PromoMissing);
        }

        // the fact write doubles as the state probe
        let effect = match action {
            LikeAction::Like => {
                let inserted = sqlx::query(
                    "INSERT INTO user_likes (user_id, promo_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                )
                .bind(user_id)
                .bind(promo_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
                if inserted > 0 {
                    LikeEffect::InsertAndIncrement
                } else {
                    LikeEffect::Nothing
                }
            }
            LikeAction::Unlike => {
                let deleted = sqlx::query("DELETE FROM user_likes WHERE user_id = $1 AND promo_id = $2")
                    .bind(user_id)
                    .bind(promo_id)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
                if deleted > 0 {
                    LikeEffect::DeleteAndDecrement
                } else {
                    LikeEffect::Nothing
                }
            }
        };

        let counter_sql = match effect {
            LikeEffect::Nothing => {
                tx.commit().await?;
                return Ok(LikeOutcome::Unchanged);
            }
            LikeEffect::InsertAndIncrement => "UPDATE promos SET like_count = like_count + 1 WHERE id = $1",
            LikeEffect::DeleteAndDecrement => {
                "UPDATE promos SET like_count = like_count - 1 WHERE id = $1 AND like_count > 0"
            }
        };
        sqlx::query(counter_sql).bind(promo_id).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(LikeOutcome::Applied)
    }

    async fn activation_tally(&self, promo_id: Uuid) -> Result<Option<ActivationTally>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(SNAPSHOT_READ).execute(&mut *tx).await?;

        let used_count: Option<i32> = sqlx::query_scalar("SELECT used_count FROM promos WHERE id = $1")
            .bind(promo_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(used_count) = used_count else {
            return Ok(None);
        };

        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT u.country, COUNT(*) FROM promo_activations a \
             JOIN users u ON u.id = a.user_id \
             WHERE a.promo_id = $1 GROUP BY u.country",
        )
        .bind(promo_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Some(ActivationTally {
            used_count,
            countries: rows
                .into_iter()
                .map(|(code, n)| CountryActivation::new(code, n))
                .collect(),
        }))
    }

    async fn activate(&self, user_id: Uuid, promo_id: Uuid, now: DateTime<Utc>) -> Result<ActivationOutcome> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM promos WHERE id = $1 FOR UPDATE", PROMO_COLUMNS);
        let row: Option<PromoRow> = sqlx::query_as(&sql)
            .bind(promo_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(promo) = row.map(Promo::try_from).transpose()? else {
            return Ok(ActivationOutcome::PromoMissing);
        };

        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user: Option<UserRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(user) = user.map(User::from) else {
            return Ok(ActivationOutcome::UserMissing);
        };

        let already: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM promo_activations WHERE promo_id = $1 AND user_id = $2)",
        )
        .bind(promo_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let code = match decide(&promo, &user.profile(), already, now) {
            Ok(code) => code,
            Err(reason) => return Ok(ActivationOutcome::Rejected(reason)),
        };

        sqlx::query(
            "INSERT INTO promo_activations (id, promo_id, user_id, code, activated_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(promo_id)
        .bind(user_id)
        .bind(&code)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE promos SET used_count = used_count + 1 WHERE id = $1")
            .bind(promo_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ActivationOutcome::Issued { code })
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        sqlx::query(
            "INSERT INTO comments (id, promo_id, user_id, text, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(comment.id)
        .bind(comment.promo_id)
        .bind(comment.user_id)
        .bind(&comment.text)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = $1", COMMENT_COLUMNS);
        let row: Option<CommentRow> = sqlx::query_as(&sql)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Comment::from))
    }

    async fn list_comments(&self, promo_id: Uuid, page: PageRequest) -> Result<Page<Comment>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE promo_id = $1")
            .bind(promo_id)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM comments WHERE promo_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            COMMENT_COLUMNS
        );
        let rows: Vec<CommentRow> = sqlx::query_as(&sql)
            .bind(promo_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: rows.into_iter().map(Comment::from).collect(),
            total,
        })
    }

    async fn update_comment(&self, comment: &Comment) -> Result<()> {
        sqlx::query("UPDATE comments SET text = $2, updated_at = $3 WHERE id = $1")
            .bind(comment.id)
            .bind(&comment.text)
            .bind(comment.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_comment(&self, comment_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
