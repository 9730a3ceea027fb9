//! Permission system for checking user roles.
//!
//! - `checker`: platform lookups (`is_admin`, `can_restrict_members`, ...)
//! - `guard`: the admin-only command policy built on top of them

pub mod checker;
pub mod guard;

pub use checker::{MemberLookup, MemberPrivileges, Permissions};
pub use guard::{CommandGuard, CommandMessage, CommandSender, GuardVerdict};
