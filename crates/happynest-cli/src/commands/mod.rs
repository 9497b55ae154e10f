pub mod digest;
pub mod list;
pub mod serve;
pub mod show;
