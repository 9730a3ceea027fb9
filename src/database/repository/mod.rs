//! MongoDB implementations of the storage contracts.

mod filter_repository;
mod member_repository;
mod settings_repository;

pub use filter_repository::FilterRepository;
pub use member_repository::MemberRepository;
pub use settings_repository::SettingsRepository;
