// Matrix data structures and encoder configuration

pub mod config;
pub mod csr;
pub mod entry;

pub use config::{DeltaConfig, EncodingStrategy};
pub use csr::SparseMatrixCSR;
pub use entry::Entry;
