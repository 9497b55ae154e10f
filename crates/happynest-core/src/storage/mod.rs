mod database;
mod news_repo;

pub use database::Database;
pub use news_repo::NewsRepository;
