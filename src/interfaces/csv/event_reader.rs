use crate::domain::transaction::RatedTransaction;
use crate::error::{ReputationError, Result};
use std::io::Read;

/// Reads transaction-created events from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<RatedTransaction>`.
/// Handles whitespace trimming and flexible record lengths automatically.
/// Expected columns: `tx_id, buyer_id, seller_id, rating`.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    /// Creates a new `EventReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes events, so
    /// large files stream without loading the whole dataset into memory.
    pub fn events(self) -> impl Iterator<Item = Result<RatedTransaction>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(ReputationError::from))
    }
}
