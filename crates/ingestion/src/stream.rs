//! Envelope Stream
//!
//! Container decoding and envelope mapping fused into one forward-only pass.

use std::io::Read;

use contracts::{DecodeError, RawEnvelope};

use crate::container::ContainerDecoder;
use crate::error::EntryError;
use crate::mapper::EnvelopeMapper;

/// Lazy sequence of typed envelopes read from one container
///
/// `Decode` errors end the stream; `Malformed` errors are per entry and the
/// stream continues after them.
pub struct EnvelopeStream<R: Read> {
    decoder: ContainerDecoder<R>,
    mapper: EnvelopeMapper,
}

impl<R: Read> EnvelopeStream<R> {
    /// Open a container for reading
    ///
    /// # Errors
    /// `DecodeError::Header` when the container header is invalid
    pub fn open(input: R) -> Result<Self, DecodeError> {
        Ok(Self {
            decoder: ContainerDecoder::new(input)?,
            mapper: EnvelopeMapper::new(),
        })
    }

    /// Container entries decoded so far, mapped or not
    pub fn entries_read(&self) -> u64 {
        self.decoder.entries_read()
    }

    pub fn schema_name(&self) -> String {
        self.decoder.schema_name()
    }
}

impl<R: Read> Iterator for EnvelopeStream<R> {
    type Item = Result<RawEnvelope, EntryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.decoder.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(EntryError::Decode(e))),
        };
        let index = entry.index;
        Some(
            self.mapper
                .map(entry)
                .map_err(|source| EntryError::Malformed { index, source }),
        )
    }
}

/// Echo each entry as `(sequence_number, body_text)`
///
/// Bodies are decoded lossily; intended for human inspection.
pub fn inspect<R: Read>(
    input: R,
) -> Result<impl Iterator<Item = Result<(i64, String), EntryError>>, DecodeError> {
    let stream = EnvelopeStream::open(input)?;
    Ok(stream.map(|item| item.map(|envelope| (envelope.sequence_number, envelope.body_text()))))
}
