//! Message handlers, one per consumed queue.
//!
//! Each handler runs inside a [`MuseumScope`](crate::scope::MuseumScope)
//! opened for that single message and returns a categorized
//! `QueueError` on failure; the worker decides whether to retry.

mod email;
mod index;
mod notification;
mod order;

pub use email::EmailHandler;
pub use index::IndexHandler;
pub use notification::NotificationHandler;
pub use order::OrderHandler;
