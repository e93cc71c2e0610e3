pub mod imports;
pub mod records;
pub mod users;
