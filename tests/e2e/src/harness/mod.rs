mod store_manager;

pub use store_manager::TestStoreManager;
