//! Reading and writing matrices in external formats

pub mod mtx;

pub use mtx::{write_matrix_market, write_matrix_market_file, MatrixMarketReader};
