//! Container Decoder
//!
//! Wraps an Avro object container (header + data blocks) as a lazy,
//! single-pass iterator of untyped entries.

use std::io::Read;

use apache_avro::types::Value;
use apache_avro::Reader;
use contracts::DecodeError;
use tracing::{debug, instrument, warn};

/// One untyped entry as stored in the container
#[derive(Debug, Clone)]
pub struct ContainerEntry {
    /// Zero-based position in the container
    pub index: u64,

    /// Decoded value (a record for well-formed capture files)
    pub value: Value,
}

/// Forward-only decoder over a container byte stream
///
/// The header is validated on construction. Iteration yields entries until
/// the stream ends or a block fails to decode; after the first error the
/// iterator is exhausted.
pub struct ContainerDecoder<R: Read> {
    reader: Reader<'static, R>,
    next_index: u64,
    failed: bool,
}

impl<R: Read> ContainerDecoder<R> {
    /// Read the container header
    ///
    /// # Errors
    /// `DecodeError::Header` on bad magic, unreadable schema or unknown codec
    #[instrument(name = "container_decoder_open", skip(input))]
    pub fn new(input: R) -> Result<Self, DecodeError> {
        let reader = Reader::new(input).map_err(|e| DecodeError::header(e.to_string()))?;
        debug!(schema = %schema_name(reader.writer_schema()), "container header read");

        Ok(Self {
            reader,
            next_index: 0,
            failed: false,
        })
    }

    /// Name of the writer schema (e.g. `Microsoft.ServiceBus.Messaging.EventData`)
    pub fn schema_name(&self) -> String {
        schema_name(self.reader.writer_schema())
    }

    /// Entries yielded so far
    pub fn entries_read(&self) -> u64 {
        self.next_index
    }
}

impl<R: Read> Iterator for ContainerDecoder<R> {
    type Item = Result<ContainerEntry, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.reader.next()? {
            Ok(value) => {
                let entry = ContainerEntry {
                    index: self.next_index,
                    value,
                };
                self.next_index += 1;
                Some(Ok(entry))
            }
            Err(e) => {
                self.failed = true;
                warn!(entry_index = self.next_index, error = %e, "container block corrupt");
                Some(Err(DecodeError::block(self.next_index, e.to_string())))
            }
        }
    }
}

fn schema_name(schema: &apache_avro::Schema) -> String {
    match schema {
        apache_avro::Schema::Record(record) => record.name.fullname(None),
        _ => "<non-record>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureEvent, CaptureWriter};

    fn container(count: i64) -> Vec<u8> {
        let mut writer = CaptureWriter::new();
        for seq in 0..count {
            writer.push(CaptureEvent::new(seq, format!("{{\"n\":{seq}}}")));
        }
        writer.into_bytes().unwrap()
    }

    #[test]
    fn test_decodes_all_entries_in_order() {
        let bytes = container(3);
        let decoder = ContainerDecoder::new(bytes.as_slice()).unwrap();
        assert_eq!(decoder.schema_name(), "Microsoft.ServiceBus.Messaging.EventData");

        let entries: Vec<_> = decoder.collect::<Result<_, _>>().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries.iter().map(|e| e.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(matches!(entries[0].value, Value::Record(_)));
    }

    #[test]
    fn test_empty_container() {
        let bytes = container(0);
        let mut decoder = ContainerDecoder::new(bytes.as_slice()).unwrap();
        assert!(decoder.next().is_none());
        assert_eq!(decoder.entries_read(), 0);
    }

    #[test]
    fn test_bad_magic_is_header_error() {
        let mut bytes = container(1);
        bytes[0] = b'X';
        let result = ContainerDecoder::new(bytes.as_slice());
        assert!(matches!(result, Err(DecodeError::Header { .. })));
    }

    #[test]
    fn test_empty_stream_is_header_error() {
        let result = ContainerDecoder::new(&[][..]);
        assert!(matches!(result, Err(DecodeError::Header { .. })));
    }

    #[test]
    fn test_truncated_block_stops_iteration() {
        let mut bytes = container(4);
        bytes.truncate(bytes.len() - 10);

        let mut decoder = ContainerDecoder::new(bytes.as_slice()).unwrap();
        let results: Vec<_> = decoder.by_ref().collect();
        assert!(matches!(results.last(), Some(Err(DecodeError::Block { .. }))));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_deflate_codec() {
        let mut writer = CaptureWriter::new().with_deflate();
        writer.push(CaptureEvent::new(9, "deflated"));
        let bytes = writer.into_bytes().unwrap();

        let entries: Vec<_> = ContainerDecoder::new(bytes.as_slice())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 1);
    }
}
