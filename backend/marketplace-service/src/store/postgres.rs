use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use super::apply::{apply, Requirements, Slots, Staging};
use super::batch::WriteBatch;
use super::change::{Change, ChangeEvent};
use super::{DocumentStore, CHANGE_FEED_CAPACITY};
use crate::config::DatabaseConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Conversation, Message, Notification, Product, Review, UserProfile};

/// PostgreSQL-backed store. Each batch runs in one transaction with the
/// touched rows locked `FOR UPDATE`; the change feed is published after the
/// transaction commits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    changes: broadcast::Sender<ChangeEvent>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { pool, changes }
    }

    pub async fn connect(config: &DatabaseConfig, url: &str) -> ServiceResult<Self> {
        debug!(
            max = config.max_connections,
            min = config.min_connections,
            "Creating database pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(10))
            .test_before_acquire(true)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> ServiceResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn fetch_docs<T>(conn: &mut PgConnection, sql: &str, ids: Vec<Uuid>) -> ServiceResult<Vec<T>>
where
    T: DeserializeOwned + Send + Unpin + 'static,
{
    let rows: Vec<Json<T>> = sqlx::query_scalar(sql)
        .bind(ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(ServiceError::from_sqlx)?;
    Ok(rows.into_iter().map(|Json(doc)| doc).collect())
}

/// Lock and stage the rows for `ids`; missing ids are staged as absent.
async fn stage_rows<T>(
    conn: &mut PgConnection,
    sql: &str,
    ids: &BTreeSet<Uuid>,
    slots: &mut Slots<Uuid, T>,
    key: fn(&T) -> Uuid,
) -> ServiceResult<()>
where
    T: DeserializeOwned + Clone + PartialEq + Send + Unpin + 'static,
{
    if ids.is_empty() {
        return Ok(());
    }
    let docs: Vec<T> = fetch_docs(conn, sql, ids.iter().copied().collect()).await?;
    let mut found: HashMap<Uuid, T> = docs.into_iter().map(|d| (key(&d), d)).collect();
    for id in ids {
        slots.load(*id, found.remove(id));
    }
    Ok(())
}

async fn stage(conn: &mut PgConnection, req: &Requirements) -> ServiceResult<Staging> {
    let mut staging = Staging::new(Utc::now());

    // Lock order: conversations, products, users, messages, reviews, notifications
    stage_rows(
        conn,
        "SELECT data FROM conversations WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        &req.conversations,
        &mut staging.conversations,
        |c: &Conversation| c.id,
    )
    .await?;
    stage_rows(
        conn,
        "SELECT data FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        &req.products,
        &mut staging.products,
        |p: &Product| p.id,
    )
    .await?;
    stage_rows(
        conn,
        "SELECT data FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        &req.users,
        &mut staging.users,
        |u: &UserProfile| u.id,
    )
    .await?;

    if !req.message_tails.is_empty() {
        let tails: Vec<(Uuid, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT conversation_id, MAX(created_at)
            FROM messages
            WHERE conversation_id = ANY($1)
            GROUP BY conversation_id
            "#,
        )
        .bind(req.message_tails.iter().copied().collect::<Vec<_>>())
        .fetch_all(&mut *conn)
        .await?;
        staging.message_tails.extend(tails);
    }

    if !req.message_logs.is_empty() {
        let log: Vec<Message> = fetch_docs(
            conn,
            "SELECT data FROM messages WHERE conversation_id = ANY($1) ORDER BY id FOR UPDATE",
            req.message_logs.iter().copied().collect(),
        )
        .await?;
        for msg in log {
            staging.messages.load(msg.id, Some(msg));
        }
    }

    stage_rows(
        conn,
        "SELECT data FROM reviews WHERE id = ANY($1) FOR UPDATE",
        &req.reviews,
        &mut staging.reviews,
        |r: &Review| r.id,
    )
    .await?;

    if !req.review_pairs.is_empty() {
        let reviewers: Vec<Uuid> = req.review_pairs.iter().map(|(r, _)| *r).collect();
        let pairs: Vec<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT reviewer_id, product_id
            FROM reviews
            WHERE reviewer_id = ANY($1)
            "#,
        )
        .bind(reviewers)
        .fetch_all(&mut *conn)
        .await?;
        staging.review_pairs.extend(
            pairs
                .into_iter()
                .filter(|pair| req.review_pairs.contains(pair)),
        );
    }

    if !req.notifications.is_empty() {
        let ids: Vec<String> = req.notifications.iter().cloned().collect();
        let rows: Vec<Json<Notification>> = sqlx::query_scalar(
            "SELECT data FROM notifications WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(ids.clone())
        .fetch_all(&mut *conn)
        .await?;
        let mut found: HashMap<String, Notification> = rows
            .into_iter()
            .map(|Json(n)| (n.id.clone(), n))
            .collect();
        for id in ids {
            let doc = found.remove(&id);
            staging.notifications.load(id, doc);
        }
    }

    if !req.unread_notifications_of.is_empty() {
        let rows: Vec<Json<Notification>> = sqlx::query_scalar(
            r#"
            SELECT data FROM notifications
            WHERE user_id = ANY($1) AND NOT is_read
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(req.unread_notifications_of.iter().copied().collect::<Vec<_>>())
        .fetch_all(&mut *conn)
        .await?;
        for Json(n) in rows {
            staging.notifications.load(n.id.clone(), Some(n));
        }
    }

    if let Some(cutoff) = req.expired_before {
        let rows: Vec<Json<Notification>> = sqlx::query_scalar(
            r#"
            SELECT data FROM notifications
            WHERE expires_at <= $1
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(cutoff)
        .fetch_all(&mut *conn)
        .await?;
        for Json(n) in rows {
            staging.notifications.load(n.id.clone(), Some(n));
        }
    }

    Ok(staging)
}

async fn persist(conn: &mut PgConnection, event: &ChangeEvent) -> ServiceResult<()> {
    match event {
        ChangeEvent::User(change) => persist_user(conn, change).await,
        ChangeEvent::Product(change) => persist_product(conn, change).await,
        ChangeEvent::Conversation(change) => persist_conversation(conn, change).await,
        ChangeEvent::Message(change) => persist_message(conn, change).await,
        ChangeEvent::Review(change) => persist_review(conn, change).await,
        ChangeEvent::Notification(change) => persist_notification(conn, change).await,
    }
}

async fn persist_user(conn: &mut PgConnection, change: &Change<UserProfile>) -> ServiceResult<()> {
    match (&change.before, &change.after) {
        (_, Some(user)) => {
            sqlx::query(
                r#"
                INSERT INTO users (id, data)
                VALUES ($1, $2)
                ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data
                "#,
            )
            .bind(user.id)
            .bind(Json(user))
            .execute(&mut *conn)
            .await
            .map_err(ServiceError::from_sqlx)?;
        }
        (Some(user), None) => {
            sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(user.id)
                .execute(&mut *conn)
                .await?;
        }
        (None, None) => {}
    }
    Ok(())
}

async fn persist_product(conn: &mut PgConnection, change: &Change<Product>) -> ServiceResult<()> {
    match (&change.before, &change.after) {
        (None, Some(p)) => {
            sqlx::query(
                r#"
                INSERT INTO products (id, seller_id, favorited_by, created_at, updated_at, data)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(p.id)
            .bind(p.seller_id)
            .bind(p.favorited_by.iter().copied().collect::<Vec<_>>())
            .bind(p.created_at)
            .bind(p.updated_at)
            .bind(Json(p))
            .execute(&mut *conn)
            .await
            .map_err(ServiceError::from_sqlx)?;
        }
        (Some(_), Some(p)) => {
            sqlx::query(
                r#"
                UPDATE products
                SET favorited_by = $2, updated_at = $3, data = $4
                WHERE id = $1
                "#,
            )
            .bind(p.id)
            .bind(p.favorited_by.iter().copied().collect::<Vec<_>>())
            .bind(p.updated_at)
            .bind(Json(p))
            .execute(&mut *conn)
            .await?;
        }
        (Some(p), None) => {
            sqlx::query("DELETE FROM products WHERE id = $1")
                .bind(p.id)
                .execute(&mut *conn)
                .await?;
        }
        (None, None) => {}
    }
    Ok(())
}

async fn persist_conversation(
    conn: &mut PgConnection,
    change: &Change<Conversation>,
) -> ServiceResult<()> {
    match (&change.before, &change.after) {
        // Plain insert: a concurrent create of the same id fails with 23505
        (None, Some(c)) => {
            sqlx::query(
                r#"
                INSERT INTO conversations (id, participant_ids, product_id, last_activity, data)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(c.id)
            .bind(c.participant_ids.clone())
            .bind(c.product.id)
            .bind(c.last_activity)
            .bind(Json(c))
            .execute(&mut *conn)
            .await
            .map_err(ServiceError::from_sqlx)?;
        }
        (Some(_), Some(c)) => {
            sqlx::query(
                r#"
                UPDATE conversations
                SET last_activity = $2, data = $3
                WHERE id = $1
                "#,
            )
            .bind(c.id)
            .bind(c.last_activity)
            .bind(Json(c))
            .execute(&mut *conn)
            .await?;
        }
        (Some(c), None) => {
            sqlx::query("DELETE FROM conversations WHERE id = $1")
                .bind(c.id)
                .execute(&mut *conn)
                .await?;
        }
        (None, None) => {}
    }
    Ok(())
}

async fn persist_message(conn: &mut PgConnection, change: &Change<Message>) -> ServiceResult<()> {
    match (&change.before, &change.after) {
        (_, Some(m)) => {
            sqlx::query(
                r#"
                INSERT INTO messages (id, conversation_id, created_at, data)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(m.id)
            .bind(m.conversation_id)
            .bind(m.timestamp)
            .bind(Json(m))
            .execute(&mut *conn)
            .await
            .map_err(ServiceError::from_sqlx)?;
        }
        (Some(m), None) => {
            sqlx::query("DELETE FROM messages WHERE id = $1")
                .bind(m.id)
                .execute(&mut *conn)
                .await?;
        }
        (None, None) => {}
    }
    Ok(())
}

async fn persist_review(conn: &mut PgConnection, change: &Change<Review>) -> ServiceResult<()> {
    match (&change.before, &change.after) {
        // The (reviewer_id, product_id) constraint backs the precondition
        (_, Some(r)) => {
            sqlx::query(
                r#"
                INSERT INTO reviews (id, reviewer_id, product_id, rated_user_id, created_at, data)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(r.id)
            .bind(r.reviewer_id)
            .bind(r.product_id)
            .bind(r.rated_user_id)
            .bind(r.created_at)
            .bind(Json(r))
            .execute(&mut *conn)
            .await
            .map_err(ServiceError::from_sqlx)?;
        }
        (Some(r), None) => {
            sqlx::query("DELETE FROM reviews WHERE id = $1")
                .bind(r.id)
                .execute(&mut *conn)
                .await?;
        }
        (None, None) => {}
    }
    Ok(())
}

async fn persist_notification(
    conn: &mut PgConnection,
    change: &Change<Notification>,
) -> ServiceResult<()> {
    match (&change.before, &change.after) {
        // Deterministic ids overwrite on replay
        (_, Some(n)) => {
            sqlx::query(
                r#"
                INSERT INTO notifications (id, user_id, is_read, created_at, expires_at, data)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE
                SET user_id = EXCLUDED.user_id,
                    is_read = EXCLUDED.is_read,
                    created_at = EXCLUDED.created_at,
                    expires_at = EXCLUDED.expires_at,
                    data = EXCLUDED.data
                "#,
            )
            .bind(n.id.as_str())
            .bind(n.user_id)
            .bind(n.is_read)
            .bind(n.created_at)
            .bind(n.expires_at)
            .bind(Json(n))
            .execute(&mut *conn)
            .await?;
        }
        (Some(n), None) => {
            sqlx::query("DELETE FROM notifications WHERE id = $1")
                .bind(n.id.as_str())
                .execute(&mut *conn)
                .await?;
        }
        (None, None) => {}
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn commit(&self, batch: WriteBatch) -> ServiceResult<Vec<ChangeEvent>> {
        let req = Requirements::of(&batch);
        let mut tx = self.pool.begin().await?;

        let staging = stage(&mut tx, &req).await?;
        let events = apply(batch, staging)?;
        for event in &events {
            persist(&mut tx, event).await?;
        }
        tx.commit().await.map_err(ServiceError::from_sqlx)?;

        for event in &events {
            let _ = self.changes.send(event.clone());
        }
        Ok(events)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    async fn get_conversation(&self, id: Uuid) -> ServiceResult<Option<Conversation>> {
        let row: Option<Json<Conversation>> =
            sqlx::query_scalar("SELECT data FROM conversations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|Json(c)| c))
    }

    async fn conversations_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<Conversation>> {
        let rows: Vec<Json<Conversation>> = sqlx::query_scalar(
            r#"
            SELECT data FROM conversations
            WHERE participant_ids @> ARRAY[$1]::uuid[]
            ORDER BY last_activity DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(c)| c).collect())
    }

    async fn conversations_for_user_and_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> ServiceResult<Vec<Conversation>> {
        let rows: Vec<Json<Conversation>> = sqlx::query_scalar(
            r#"
            SELECT data FROM conversations
            WHERE participant_ids @> ARRAY[$1]::uuid[] AND product_id = $2
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(c)| c).collect())
    }

    async fn messages(&self, conversation_id: Uuid) -> ServiceResult<Vec<Message>> {
        let rows: Vec<Json<Message>> = sqlx::query_scalar(
            r#"
            SELECT data FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(m)| m).collect())
    }

    async fn get_product(&self, id: Uuid) -> ServiceResult<Option<Product>> {
        let row: Option<Json<Product>> =
            sqlx::query_scalar("SELECT data FROM products WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|Json(p)| p))
    }

    async fn products_favorited_by(&self, user_id: Uuid) -> ServiceResult<Vec<Product>> {
        let rows: Vec<Json<Product>> = sqlx::query_scalar(
            r#"
            SELECT data FROM products
            WHERE favorited_by @> ARRAY[$1]::uuid[]
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(p)| p).collect())
    }

    async fn products_by_seller(&self, seller_id: Uuid) -> ServiceResult<Vec<Product>> {
        let rows: Vec<Json<Product>> = sqlx::query_scalar(
            r#"
            SELECT data FROM products
            WHERE seller_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(p)| p).collect())
    }

    async fn get_user(&self, id: Uuid) -> ServiceResult<Option<UserProfile>> {
        let row: Option<Json<UserProfile>> =
            sqlx::query_scalar("SELECT data FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|Json(u)| u))
    }

    async fn review_exists(&self, reviewer_id: Uuid, product_id: Uuid) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reviews
                WHERE reviewer_id = $1 AND product_id = $2
            )
            "#,
        )
        .bind(reviewer_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn get_review(&self, id: Uuid) -> ServiceResult<Option<Review>> {
        let row: Option<Json<Review>> = sqlx::query_scalar("SELECT data FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(r)| r))
    }

    async fn reviews_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<Review>> {
        let rows: Vec<Json<Review>> = sqlx::query_scalar(
            r#"
            SELECT data FROM reviews
            WHERE rated_user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(r)| r).collect())
    }

    async fn get_notification(&self, id: &str) -> ServiceResult<Option<Notification>> {
        let row: Option<Json<Notification>> =
            sqlx::query_scalar("SELECT data FROM notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|Json(n)| n))
    }

    async fn notifications_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<Notification>> {
        let rows: Vec<Json<Notification>> = sqlx::query_scalar(
            r#"
            SELECT data FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(n)| n).collect())
    }
}
