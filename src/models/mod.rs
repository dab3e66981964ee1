//! Data models for the classroom hub.
//!
//! Serialized field names match what the browser client reads.

mod chat;
mod identity;
mod lesson;
mod meal;
mod notice;

pub use chat::*;
pub use identity::*;
pub use lesson::*;
pub use meal::*;
pub use notice::*;
