use crate::models::{Conversation, Message, Notification, Product, Review, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Before/after images of one document touched by a commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    pub before: Option<T>,
    pub after: Option<T>,
}

impl<T> Change<T> {
    pub fn kind(&self) -> ChangeKind {
        match (&self.before, &self.after) {
            (None, _) => ChangeKind::Created,
            (Some(_), Some(_)) => ChangeKind::Updated,
            (Some(_), None) => ChangeKind::Deleted,
        }
    }
}

/// Published on the change feed after a batch commits, one per document.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    User(Change<UserProfile>),
    Product(Change<Product>),
    Conversation(Change<Conversation>),
    Message(Change<Message>),
    Review(Change<Review>),
    Notification(Change<Notification>),
}

impl ChangeEvent {
    pub fn collection(&self) -> &'static str {
        match self {
            ChangeEvent::User(_) => "users",
            ChangeEvent::Product(_) => "products",
            ChangeEvent::Conversation(_) => "conversations",
            ChangeEvent::Message(_) => "messages",
            ChangeEvent::Review(_) => "reviews",
            ChangeEvent::Notification(_) => "notifications",
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::User(c) => c.kind(),
            ChangeEvent::Product(c) => c.kind(),
            ChangeEvent::Conversation(c) => c.kind(),
            ChangeEvent::Message(c) => c.kind(),
            ChangeEvent::Review(c) => c.kind(),
            ChangeEvent::Notification(c) => c.kind(),
        }
    }

    /// The message created by this event, if any.
    pub fn created_message(&self) -> Option<&Message> {
        match self {
            ChangeEvent::Message(Change {
                before: None,
                after: Some(msg),
            }) => Some(msg),
            _ => None,
        }
    }
}
