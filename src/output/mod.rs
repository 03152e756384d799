pub mod package;

use anyhow::{bail, Result};
use chrono::Utc;
use rand::Rng;

/// Fixed batch size for both output streams.
pub const CHUNK_ROWS: usize = 300;

const JOB_SUFFIX_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const JOB_SUFFIX_LEN: usize = 6;

/// Current UTC date as `YYYYMMDD`, taken at job completion.
pub fn utc_yyyymmdd() -> String {
    Utc::now().format("%Y%m%d").to_string()
}

/// Fresh job identifier: `J-{UTCDATE}-{6 uppercase alphanumeric}`.
pub fn new_job_id(date_utc: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..JOB_SUFFIX_LEN)
        .map(|_| JOB_SUFFIX_CHARS[rng.gen_range(0..JOB_SUFFIX_CHARS.len())] as char)
        .collect();
    format!("J-{}-{}", date_utc, suffix)
}

/// Allocates successive zero-padded sequence numbers, preserving the width
/// of the starting sequence string. Shared across both output streams.
#[derive(Debug)]
pub struct Sequencer {
    next: u64,
    width: usize,
}

impl Sequencer {
    /// The starting sequence must be at least three digits; leading zeros
    /// set the pad width for every allocated value.
    pub fn new(start_seq: &str) -> Result<Self> {
        if start_seq.len() < 3 || !start_seq.bytes().all(|b| b.is_ascii_digit()) {
            bail!("start sequence must be at least 3 digits, got {:?}", start_seq);
        }
        Ok(Self {
            next: start_seq.parse()?,
            width: start_seq.len(),
        })
    }

    pub fn next(&mut self) -> String {
        let seq = format!("{:0>width$}", self.next, width = self.width);
        self.next += 1;
        seq
    }
}

/// `{seq}_prf_bulk_import_{UTCDATE}.csv` — no chunk-index suffix, ever.
pub fn new_member_file_name(seq: &str, date_utc: &str) -> String {
    format!("{}_prf_bulk_import_{}.csv", seq, date_utc)
}

/// `{seq}_extension_prf_bulk_import_{UTCDATE}.csv`
pub fn existing_member_file_name(seq: &str, date_utc: &str) -> String {
    format!("{}_extension_prf_bulk_import_{}.csv", seq, date_utc)
}

/// Name every chunk of both streams: new-member chunks first, then
/// existing-member chunks, one shared increasing sequence.
pub fn build_file_names(
    new_chunks: usize,
    old_chunks: usize,
    start_seq: &str,
    date_utc: &str,
) -> Result<(Vec<String>, Vec<String>)> {
    let mut seq = Sequencer::new(start_seq)?;
    let new_names = (0..new_chunks)
        .map(|_| new_member_file_name(&seq.next(), date_utc))
        .collect();
    let old_names = (0..old_chunks)
        .map(|_| existing_member_file_name(&seq.next(), date_utc))
        .collect();
    Ok((new_names, old_names))
}

/// Split a stream into fixed-size batches, stable order, last batch short.
pub fn chunk_rows<T: Clone>(rows: &[T], size: usize) -> Vec<Vec<T>> {
    rows.chunks(size).map(|c| c.to_vec()).collect()
}
