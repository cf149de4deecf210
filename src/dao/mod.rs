pub mod database;
pub mod records;
