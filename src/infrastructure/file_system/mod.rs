pub mod local_index_store;

pub use local_index_store::LocalIndexStore;
