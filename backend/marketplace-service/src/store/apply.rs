//! Backend-independent batch semantics.
//!
//! A store loads every document a batch can touch into a [`Staging`] area,
//! runs [`apply`] against it and persists the resulting change set. Both
//! stores share this code, so precondition and field-update rules cannot
//! drift between them.

use chrono::{DateTime, Duration, DurationRound, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use uuid::Uuid;

use super::batch::{
    ConversationUpdate, NewMessage, Precondition, ProductUpdate, ProfileUpsert, WriteBatch,
    WriteOp,
};
use super::change::{Change, ChangeEvent};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    Conversation, LastMessage, Message, Notification, Product, Review, UserProfile,
};

/// Keys a batch may read or write. Sorted so row locks are always taken in
/// the same order.
#[derive(Debug, Default)]
pub struct Requirements {
    pub users: BTreeSet<Uuid>,
    pub products: BTreeSet<Uuid>,
    pub conversations: BTreeSet<Uuid>,
    /// Conversations that receive a message (need the current tail timestamp)
    pub message_tails: BTreeSet<Uuid>,
    /// Conversations whose whole message log is loaded for deletion
    pub message_logs: BTreeSet<Uuid>,
    pub reviews: BTreeSet<Uuid>,
    pub review_pairs: BTreeSet<(Uuid, Uuid)>,
    pub notifications: BTreeSet<String>,
    /// Users whose unread notifications are loaded
    pub unread_notifications_of: BTreeSet<Uuid>,
    pub expired_before: Option<DateTime<Utc>>,
}

impl Requirements {
    pub fn of(batch: &WriteBatch) -> Self {
        let mut req = Requirements::default();

        for pre in &batch.preconditions {
            match pre {
                Precondition::ConversationAbsent(id) => {
                    req.conversations.insert(*id);
                }
                Precondition::BidStatusIn {
                    conversation_id, ..
                }
                | Precondition::BidPriceIs {
                    conversation_id, ..
                } => {
                    req.conversations.insert(*conversation_id);
                }
                Precondition::ProductNotSold(id) => {
                    req.products.insert(*id);
                }
                Precondition::NoReviewFor {
                    reviewer_id,
                    product_id,
                } => {
                    req.review_pairs.insert((*reviewer_id, *product_id));
                }
            }
        }

        for op in &batch.ops {
            match op {
                WriteOp::UpsertProfile(p) => {
                    req.users.insert(p.id);
                }
                WriteOp::CreateProduct(p) => {
                    req.products.insert(p.id);
                }
                WriteOp::UpdateProduct { id, .. } => {
                    req.products.insert(*id);
                }
                WriteOp::CreateConversation(c) => {
                    req.conversations.insert(c.id);
                }
                WriteOp::UpdateConversation { id, .. } | WriteOp::DeleteConversation(id) => {
                    req.conversations.insert(*id);
                }
                WriteOp::AppendMessage(m) => {
                    req.conversations.insert(m.conversation_id);
                    req.message_tails.insert(m.conversation_id);
                }
                WriteOp::DeleteMessages { conversation_id } => {
                    req.message_logs.insert(*conversation_id);
                }
                WriteOp::CreateReview(r) => {
                    req.reviews.insert(r.id);
                    req.review_pairs.insert((r.reviewer_id, r.product_id));
                }
                WriteOp::RecordRating { user_id, .. }
                | WriteOp::AddPushToken { user_id, .. }
                | WriteOp::RemovePushTokens { user_id, .. } => {
                    req.users.insert(*user_id);
                }
                WriteOp::UpsertNotification(n) => {
                    req.notifications.insert(n.id.clone());
                }
                WriteOp::MarkNotificationRead { id } => {
                    req.notifications.insert(id.clone());
                }
                WriteOp::MarkAllNotificationsRead { user_id } => {
                    req.unread_notifications_of.insert(*user_id);
                }
                WriteOp::PurgeNotificationsBefore(ts) => {
                    req.expired_before = Some(match req.expired_before {
                        Some(prev) if prev > *ts => prev,
                        _ => *ts,
                    });
                }
            }
        }

        req
    }
}

struct Slot<T> {
    original: Option<T>,
    current: Option<T>,
}

/// Staged copies of one collection's documents.
pub struct Slots<K, T> {
    entries: HashMap<K, Slot<T>>,
    order: Vec<K>,
}

impl<K, T> Default for Slots<K, T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<K, T> Slots<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone + PartialEq,
{
    /// Record the committed value of `key`. Later loads of the same key are
    /// ignored so staged edits are never clobbered.
    pub fn load(&mut self, key: K, value: Option<T>) {
        if self.entries.contains_key(&key) {
            return;
        }
        self.order.push(key.clone());
        self.entries.insert(
            key,
            Slot {
                original: value.clone(),
                current: value,
            },
        );
    }

    pub fn get(&self, key: &K) -> Option<&T> {
        self.entries.get(key).and_then(|s| s.current.as_ref())
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut T> {
        self.entries.get_mut(key).and_then(|s| s.current.as_mut())
    }

    fn put(&mut self, key: K, value: T) {
        match self.entries.get_mut(&key) {
            Some(slot) => slot.current = Some(value),
            None => {
                self.order.push(key.clone());
                self.entries.insert(
                    key,
                    Slot {
                        original: None,
                        current: Some(value),
                    },
                );
            }
        }
    }

    fn remove(&mut self, key: &K) {
        if let Some(slot) = self.entries.get_mut(key) {
            slot.current = None;
        }
    }

    fn keys_matching(&self, pred: impl Fn(&T) -> bool) -> Vec<K> {
        self.order
            .iter()
            .filter(|k| {
                self.entries
                    .get(*k)
                    .and_then(|s| s.current.as_ref())
                    .map(&pred)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    fn into_changes(mut self) -> Vec<Change<T>> {
        let mut changes = Vec::new();
        for key in self.order {
            if let Some(slot) = self.entries.remove(&key) {
                if slot.original != slot.current {
                    changes.push(Change {
                        before: slot.original,
                        after: slot.current,
                    });
                }
            }
        }
        changes
    }
}

/// Everything a batch can see: staged documents plus the index facts the
/// preconditions need.
pub struct Staging {
    pub now: DateTime<Utc>,
    pub users: Slots<Uuid, UserProfile>,
    pub products: Slots<Uuid, Product>,
    pub conversations: Slots<Uuid, Conversation>,
    pub messages: Slots<Uuid, Message>,
    pub reviews: Slots<Uuid, Review>,
    pub notifications: Slots<String, Notification>,
    /// Timestamp of the newest committed message per conversation
    pub message_tails: HashMap<Uuid, DateTime<Utc>>,
    /// Committed (reviewer, product) pairs among the requested ones
    pub review_pairs: HashSet<(Uuid, Uuid)>,
}

impl Staging {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: truncate_micros(now),
            users: Slots::default(),
            products: Slots::default(),
            conversations: Slots::default(),
            messages: Slots::default(),
            reviews: Slots::default(),
            notifications: Slots::default(),
            message_tails: HashMap::new(),
            review_pairs: HashSet::new(),
        }
    }
}

/// Storage keeps microsecond precision.
pub fn truncate_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::microseconds(1)).unwrap_or(ts)
}

/// Check preconditions, apply every op to the staged documents and return
/// the change set. On error nothing must be persisted.
pub fn apply(batch: WriteBatch, mut staging: Staging) -> ServiceResult<Vec<ChangeEvent>> {
    check_preconditions(&batch.preconditions, &staging)?;

    // Newest message timestamp appended by this batch, per conversation
    let mut appended: HashMap<Uuid, DateTime<Utc>> = HashMap::new();

    for op in batch.ops {
        apply_op(op, &mut staging, &mut appended)?;
    }

    let mut events = Vec::new();
    events.extend(staging.users.into_changes().into_iter().map(ChangeEvent::User));
    events.extend(
        staging
            .products
            .into_changes()
            .into_iter()
            .map(ChangeEvent::Product),
    );
    events.extend(
        staging
            .conversations
            .into_changes()
            .into_iter()
            .map(ChangeEvent::Conversation),
    );
    events.extend(
        staging
            .messages
            .into_changes()
            .into_iter()
            .map(ChangeEvent::Message),
    );
    events.extend(
        staging
            .reviews
            .into_changes()
            .into_iter()
            .map(ChangeEvent::Review),
    );
    events.extend(
        staging
            .notifications
            .into_changes()
            .into_iter()
            .map(ChangeEvent::Notification),
    );
    Ok(events)
}

fn check_preconditions(preconditions: &[Precondition], staging: &Staging) -> ServiceResult<()> {
    for pre in preconditions {
        match pre {
            Precondition::ConversationAbsent(id) => {
                if staging.conversations.get(id).is_some() {
                    return Err(ServiceError::Conflict(format!(
                        "conversation {} already exists",
                        id
                    )));
                }
            }
            Precondition::BidStatusIn {
                conversation_id,
                allowed,
            } => {
                let conv = staging.conversations.get(conversation_id).ok_or_else(|| {
                    ServiceError::NotFound(format!("conversation {}", conversation_id))
                })?;
                if !allowed.contains(&conv.bid_status) {
                    let current = conv.bid_status.map(|s| s.as_str()).unwrap_or("none");
                    return Err(ServiceError::Conflict(format!(
                        "bid is {} on conversation {}",
                        current, conversation_id
                    )));
                }
            }
            Precondition::BidPriceIs {
                conversation_id,
                price,
            } => {
                let conv = staging.conversations.get(conversation_id).ok_or_else(|| {
                    ServiceError::NotFound(format!("conversation {}", conversation_id))
                })?;
                if conv.bid_price != *price {
                    return Err(ServiceError::Conflict(format!(
                        "bid on conversation {} changed",
                        conversation_id
                    )));
                }
            }
            Precondition::ProductNotSold(id) => {
                let product = staging
                    .products
                    .get(id)
                    .ok_or_else(|| ServiceError::NotFound(format!("product {}", id)))?;
                if product.is_sold() {
                    return Err(ServiceError::Conflict(format!(
                        "product {} is already sold",
                        id
                    )));
                }
            }
            Precondition::NoReviewFor {
                reviewer_id,
                product_id,
            } => {
                if staging.review_pairs.contains(&(*reviewer_id, *product_id)) {
                    return Err(ServiceError::Conflict(format!(
                        "user {} already reviewed product {}",
                        reviewer_id, product_id
                    )));
                }
            }
        }
    }
    Ok(())
}

fn apply_op(
    op: WriteOp,
    staging: &mut Staging,
    appended: &mut HashMap<Uuid, DateTime<Utc>>,
) -> ServiceResult<()> {
    let now = staging.now;
    match op {
        WriteOp::UpsertProfile(profile) => upsert_profile(staging, profile),

        WriteOp::CreateProduct(mut product) => {
            if staging.products.get(&product.id).is_some() {
                return Err(ServiceError::Conflict(format!(
                    "product {} already exists",
                    product.id
                )));
            }
            product.favorites = product.favorited_by.len() as i64;
            product.created_at = now;
            product.updated_at = now;
            staging.products.put(product.id, product);
        }

        WriteOp::UpdateProduct { id, update } => {
            let product = staging
                .products
                .get_mut(&id)
                .ok_or_else(|| ServiceError::NotFound(format!("product {}", id)))?;
            update_product(product, update, now);
        }

        WriteOp::CreateConversation(mut conv) => {
            if staging.conversations.get(&conv.id).is_some() {
                return Err(ServiceError::Conflict(format!(
                    "conversation {} already exists",
                    conv.id
                )));
            }
            let distinct: BTreeSet<_> = conv.participant_ids.iter().collect();
            if conv.participant_ids.len() != 2 || distinct.len() != 2 {
                return Err(ServiceError::Validation(
                    "a conversation needs exactly two distinct participants".to_string(),
                ));
            }
            conv.participant_ids.sort();
            conv.created_at = now;
            conv.last_activity = now;
            staging.conversations.put(conv.id, conv);
        }

        WriteOp::UpdateConversation { id, update } => {
            let stamp = appended.get(&id).copied().unwrap_or(now);
            let conv = staging
                .conversations
                .get_mut(&id)
                .ok_or_else(|| ServiceError::NotFound(format!("conversation {}", id)))?;
            update_conversation(conv, update, stamp)?;
        }

        WriteOp::DeleteConversation(id) => staging.conversations.remove(&id),

        WriteOp::AppendMessage(msg) => append_message(staging, appended, msg)?,

        WriteOp::DeleteMessages { conversation_id } => {
            for id in staging
                .messages
                .keys_matching(|m| m.conversation_id == conversation_id)
            {
                staging.messages.remove(&id);
            }
        }

        WriteOp::CreateReview(mut review) => {
            if staging.reviews.get(&review.id).is_some()
                || staging
                    .review_pairs
                    .contains(&(review.reviewer_id, review.product_id))
            {
                return Err(ServiceError::Conflict(format!(
                    "user {} already reviewed product {}",
                    review.reviewer_id, review.product_id
                )));
            }
            if !(1..=5).contains(&review.rating) {
                return Err(ServiceError::Validation(
                    "rating must be between 1 and 5".to_string(),
                ));
            }
            review.created_at = now;
            staging
                .review_pairs
                .insert((review.reviewer_id, review.product_id));
            staging.reviews.put(review.id, review);
        }

        WriteOp::RecordRating { user_id, rating } => {
            let user = staging
                .users
                .get_mut(&user_id)
                .ok_or_else(|| ServiceError::NotFound(format!("user {}", user_id)))?;
            user.record_rating(rating);
        }

        WriteOp::AddPushToken { user_id, token } => {
            if token.trim().is_empty() {
                return Err(ServiceError::Validation(
                    "push token must not be empty".to_string(),
                ));
            }
            let user = staging
                .users
                .get_mut(&user_id)
                .ok_or_else(|| ServiceError::NotFound(format!("user {}", user_id)))?;
            user.push_tokens.insert(token);
        }

        WriteOp::RemovePushTokens { user_id, tokens } => {
            if let Some(user) = staging.users.get_mut(&user_id) {
                for token in &tokens {
                    user.push_tokens.remove(token);
                }
            }
        }

        WriteOp::UpsertNotification(notification) => {
            staging
                .notifications
                .put(notification.id.clone(), notification);
        }

        WriteOp::MarkNotificationRead { id } => {
            let notification = staging
                .notifications
                .get_mut(&id)
                .ok_or_else(|| ServiceError::NotFound(format!("notification {}", id)))?;
            notification.is_read = true;
        }

        WriteOp::MarkAllNotificationsRead { user_id } => {
            for id in staging
                .notifications
                .keys_matching(|n| n.user_id == user_id && !n.is_read)
            {
                if let Some(n) = staging.notifications.get_mut(&id) {
                    n.is_read = true;
                }
            }
        }

        WriteOp::PurgeNotificationsBefore(cutoff) => {
            for id in staging
                .notifications
                .keys_matching(|n| n.is_expired(cutoff))
            {
                staging.notifications.remove(&id);
            }
        }
    }
    Ok(())
}

fn upsert_profile(staging: &mut Staging, profile: ProfileUpsert) {
    match staging.users.get_mut(&profile.id) {
        Some(user) => {
            user.display_name = profile.display_name;
            user.photo_url = profile.photo_url;
        }
        None => {
            let mut user = UserProfile::new(profile.id, profile.display_name, profile.photo_url);
            user.created_at = staging.now;
            staging.users.put(profile.id, user);
        }
    }
}

fn update_product(product: &mut Product, update: ProductUpdate, now: DateTime<Utc>) {
    if let Some(price) = update.price {
        product.price = price;
    }
    if let Some(status) = update.status {
        product.status = status;
    }
    if let Some(user_id) = update.add_favorite {
        if product.favorited_by.insert(user_id) {
            product.favorites += 1;
        }
    }
    if let Some(user_id) = update.remove_favorite {
        if product.favorited_by.remove(&user_id) {
            product.favorites = (product.favorites - 1).max(0);
        }
    }
    product.updated_at = now;
}

fn update_conversation(
    conv: &mut Conversation,
    update: ConversationUpdate,
    stamp: DateTime<Utc>,
) -> ServiceResult<()> {
    let outsiders = update
        .increment_unread
        .iter()
        .chain(update.reset_unread.iter())
        .chain(update.hide_for.iter())
        .chain(update.review_status.iter().map(|(id, _)| id))
        .chain(update.bid.iter().filter_map(|b| b.bidder_id.as_ref()))
        .any(|id| !conv.is_participant(*id));
    if outsiders {
        return Err(ServiceError::Validation(format!(
            "conversation {} update names a non-participant",
            conv.id
        )));
    }

    if let Some((text, sender_id)) = update.last_message {
        conv.last_message = Some(LastMessage {
            text,
            sender_id,
            timestamp: stamp,
        });
        conv.last_activity = stamp;
    }
    if update.touch_activity {
        conv.last_activity = stamp;
    }
    for user_id in update.increment_unread {
        *conv.unread_counts.entry(user_id).or_insert(0) += 1;
    }
    if let Some(user_id) = update.reset_unread {
        conv.unread_counts.insert(user_id, 0);
    }
    if let Some(bid) = update.bid {
        conv.bid_status = Some(bid.status);
        if let Some(price) = bid.price {
            conv.bid_price = Some(price);
        }
        if let Some(bidder_id) = bid.bidder_id {
            conv.bidder_id = Some(bidder_id);
        }
    }
    if let Some(status) = update.product_status {
        conv.product.status = status;
    }
    for (user_id, done) in update.review_status {
        conv.review_status.insert(user_id, done);
    }
    for user_id in update.hide_for {
        conv.hidden_for.insert(user_id);
    }
    Ok(())
}

fn append_message(
    staging: &mut Staging,
    appended: &mut HashMap<Uuid, DateTime<Utc>>,
    msg: NewMessage,
) -> ServiceResult<()> {
    let text = msg.text.trim();
    if text.is_empty() {
        return Err(ServiceError::Validation(
            "message text must not be empty".to_string(),
        ));
    }
    let conv = staging
        .conversations
        .get(&msg.conversation_id)
        .ok_or_else(|| ServiceError::NotFound(format!("conversation {}", msg.conversation_id)))?;
    if !conv.is_participant(msg.sender_id) {
        return Err(ServiceError::PermissionDenied(format!(
            "user {} is not a participant of conversation {}",
            msg.sender_id, msg.conversation_id
        )));
    }

    // Strictly after the previous message so commit order is read order
    let tail = appended
        .get(&msg.conversation_id)
        .or_else(|| staging.message_tails.get(&msg.conversation_id))
        .copied();
    let timestamp = match tail {
        Some(prev) if prev >= staging.now => prev + Duration::microseconds(1),
        _ => staging.now,
    };
    appended.insert(msg.conversation_id, timestamp);

    staging.messages.put(
        msg.id,
        Message {
            id: msg.id,
            conversation_id: msg.conversation_id,
            sender_id: msg.sender_id,
            text: text.to_string(),
            kind: msg.kind,
            timestamp,
        },
    );
    Ok(())
}
