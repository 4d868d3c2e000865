pub mod change_feed;
pub mod db;
pub mod humanizer;
pub mod pg_listener;

pub use change_feed::InMemoryChangeFeed;
pub use db::DbAdapter;
pub use humanizer::HttpHumanizerAdapter;
pub use pg_listener::forward_row_changes;
