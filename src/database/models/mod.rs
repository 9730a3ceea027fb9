//! Database models.

pub mod chat_settings;
pub mod common;
pub mod filter;
pub mod member;
pub mod tag_session;

pub use chat_settings::{default_member_permissions, ChatSettings, PermissionSnapshot};
pub use common::InlineButton;
pub use filter::{find_match, normalize_keyword, FilterContent, FilterRecord, FilterType, MediaKind};
pub use member::Member;
pub use tag_session::TagSession;
