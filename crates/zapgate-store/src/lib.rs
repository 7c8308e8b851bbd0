//! SQLite persistence and filesystem media storage.

pub mod media_fs;
pub mod store;

pub use media_fs::FsMediaStore;
pub use store::Store;
