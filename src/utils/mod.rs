//! Utility functions and helpers

pub mod formats;

pub use formats::{decode_to_sprs, from_sprs_csr, to_sprs_csr};
