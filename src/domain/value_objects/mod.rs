pub mod file_hash;
pub mod provenance;

pub use file_hash::FileHash;
pub use provenance::Provenance;
