pub mod manager;
pub mod rows;
pub mod store;

pub use manager::DatabaseError;
pub use store::RecordStore;
