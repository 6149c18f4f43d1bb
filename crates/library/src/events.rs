//! Shelf change notifications.
//!
//! Mutations announce themselves after they succeed; anything rendering a
//! book list re-reads on notification instead of relying on an invalidated
//! cache. Subscribers that fall behind lose the oldest events, which is fine
//! for a "something changed, re-list" signal.

/// What changed, carrying the affected record id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
    /// A book was imported.
    Added(String),
    /// A book's reading state or favorite flag changed.
    Updated(String),
    /// A book was removed.
    Removed(String),
}

impl LibraryEvent {
    /// Id of the record the event is about.
    pub fn record_id(&self) -> &str {
        match self {
            Self::Added(id) | Self::Updated(id) | Self::Removed(id) => id,
        }
    }
}

pub(crate) const EVENT_CAPACITY: usize = 64;
