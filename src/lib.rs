pub mod config;
pub mod models;
pub mod server;
pub mod services;
pub mod utils;

pub use models::{Chapter, ChapterField, Illustration, Work};
pub use services::history::HistoryManager;
pub use services::persistence::PersistenceCoordinator;
pub use services::session::SessionController;
