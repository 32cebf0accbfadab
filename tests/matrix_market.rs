//! Reading MatrixMarket input, plain and gzip compressed, into the encoder

mod common;

use std::io::{Cursor, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

use spm_delta::io::write_matrix_market_file;
use spm_delta::{
    encode_entries, write_matrix_market, DeltaConfig, DeltaError, EncodingStrategy,
    MatrixMarketReader, SparseMatrixCSR,
};

fn to_text(m: &SparseMatrixCSR<f64>) -> Vec<u8> {
    let mut out = Vec::new();
    write_matrix_market(&mut out, m).unwrap();
    out
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn test_plain_text_roundtrip() {
    let m = common::structured_matrix(50, 900, 1);
    let read = MatrixMarketReader::<f64>::from_reader(Cursor::new(to_text(&m)))
        .unwrap()
        .into_csr()
        .unwrap();
    assert_eq!(read, m);
}

#[test]
fn test_gzip_detected_by_magic() {
    let m = common::structured_matrix(50, 900, 2);
    let compressed = gzip(&to_text(&m));
    assert_eq!(&compressed[..2], &[0x1f, 0x8b]);

    let reader = MatrixMarketReader::<f64>::from_reader(Cursor::new(compressed)).unwrap();
    assert_eq!((reader.n_rows(), reader.n_cols()), (50, 900));
    assert_eq!(reader.into_csr().unwrap(), m);
}

#[test]
fn test_reader_streams_into_encoder() {
    let m = common::structured_matrix(80, 2_000, 4);
    let reader = MatrixMarketReader::<f64>::from_reader(Cursor::new(gzip(&to_text(&m)))).unwrap();
    let (n_rows, n_cols) = (reader.n_rows(), reader.n_cols());

    let config = DeltaConfig::for_strategy(EncodingStrategy::Combined);
    let encoded = encode_entries(reader, n_rows, n_cols, &config).unwrap();
    assert_eq!(encoded.to_csr().unwrap(), m);
}

#[test]
fn test_column_major_file_sorted_on_load() {
    let text = "%%MatrixMarket matrix coordinate real general\n\
                3 3 4\n\
                1 1 1.0\n\
                3 1 2.0\n\
                2 2 3.0\n\
                1 3 4.0\n";
    let m = MatrixMarketReader::<f64>::from_reader(Cursor::new(text.as_bytes().to_vec()))
        .unwrap()
        .into_csr()
        .unwrap();
    assert_eq!(m.row_ptr, vec![0, 2, 3, 4]);
    assert_eq!(m.col_idx, vec![0, 2, 1, 0]);
    assert_eq!(m.values, vec![1.0, 4.0, 3.0, 2.0]);
}

#[test]
fn test_column_major_stream_rejected_by_encoder() {
    let text = "%%MatrixMarket matrix coordinate real general\n\
                3 3 2\n\
                3 1 2.0\n\
                1 2 3.0\n";
    let reader =
        MatrixMarketReader::<f64>::from_reader(Cursor::new(text.as_bytes().to_vec())).unwrap();
    let err = encode_entries(reader, 3, 3, &DeltaConfig::default()).unwrap_err();
    assert!(matches!(err, DeltaError::UnsortedRows { previous: 2, row: 0 }));
}

#[test]
fn test_file_roundtrip() {
    let m = common::structured_matrix(30, 500, 8);
    let path = std::env::temp_dir().join(format!("spm_delta_roundtrip_{}.mtx", std::process::id()));
    write_matrix_market_file(&path, &m).unwrap();

    let read = MatrixMarketReader::<f64>::open(&path).and_then(|r| r.into_csr());
    std::fs::remove_file(&path).unwrap();
    assert_eq!(read.unwrap(), m);
}

#[test]
fn test_missing_file_is_io_error() {
    let path = std::env::temp_dir().join("spm_delta_does_not_exist.mtx");
    assert!(matches!(
        MatrixMarketReader::<f64>::open(path),
        Err(DeltaError::Io(_))
    ));
}

#[test]
fn test_truncated_gzip_fails() {
    let m = common::structured_matrix(40, 800, 6);
    let compressed = gzip(&to_text(&m));
    let cut = compressed[..compressed.len() / 2].to_vec();

    let outcome = MatrixMarketReader::<f64>::from_reader(Cursor::new(cut)).and_then(|r| r.into_csr());
    assert!(outcome.is_err());
}
