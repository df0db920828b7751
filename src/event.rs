//! Incoming event abstraction.
//!
//! The resolver only needs the sender identity of an event, to derive the
//! REQUEST cache key. Everything else about the event is opaque and reaches
//! providers through the reserved `event` parameter.

use std::any::Any;
use std::sync::Arc;

/// An incoming event that triggers a handler.
///
/// # Examples
///
/// ```rust
/// use event_di::Event;
/// use std::any::Any;
///
/// struct Message {
///     from_user: Option<i64>,
///     chat: Option<i64>,
///     text: String,
/// }
///
/// impl Event for Message {
///     fn from_user_id(&self) -> Option<i64> { self.from_user }
///     fn chat_id(&self) -> Option<i64> { self.chat }
///     fn as_any(&self) -> &dyn Any { self }
/// }
///
/// let msg = Message { from_user: Some(123), chat: None, text: "hi".into() };
/// let event: &dyn Event = &msg;
/// assert_eq!(event.downcast_ref::<Message>().unwrap().text, "hi");
/// ```
pub trait Event: Send + Sync + 'static {
    /// Identifier of the user who sent the event, if any.
    fn from_user_id(&self) -> Option<i64>;

    /// Identifier of the chat the event belongs to, if any.
    fn chat_id(&self) -> Option<i64>;

    /// Returns the event as `Any` for typed access.
    fn as_any(&self) -> &dyn Any;
}

impl dyn Event {
    /// Downcasts the event to a concrete type.
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Shared reference to an event.
pub type EventRef = Arc<dyn Event>;

/// Minimal event carrying only sender identity.
///
/// Useful for hosts whose events are not otherwise needed by providers, and
/// for tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderEvent {
    /// Sending user, if known
    pub user_id: Option<i64>,
    /// Chat, if known
    pub chat_id: Option<i64>,
}

impl SenderEvent {
    /// Event from a user.
    pub fn from_user(user_id: i64) -> Self {
        Self { user_id: Some(user_id), chat_id: None }
    }

    /// Event in a chat with no known user.
    pub fn in_chat(chat_id: i64) -> Self {
        Self { user_id: None, chat_id: Some(chat_id) }
    }

    /// Event with no sender identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Sets the chat id.
    pub fn with_chat(mut self, chat_id: i64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }
}

impl Event for SenderEvent {
    fn from_user_id(&self) -> Option<i64> {
        self.user_id
    }

    fn chat_id(&self) -> Option<i64> {
        self.chat_id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
