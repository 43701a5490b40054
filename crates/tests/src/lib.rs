//! # Integration Tests
//!
//! Cross-crate scenarios over real capture containers and the in-memory store:
//! - batch scenarios (valid, partial, corrupt, storage loss)
//! - pipeline properties (counting, atomicity, time preservation, skips)
//! - configuration driving the pipeline

/// Capture container fixtures
#[cfg(test)]
mod fixtures {
    use contracts::{DeviceAddress, DeviceId};
    use ingestion::{CaptureEvent, CaptureWriter};
    use persistence::InMemoryTelemetryStore;

    pub const KNOWN: &str = "C8:25:2D:8E:9C:2C";
    pub const OTHER_KNOWN: &str = "F0:0D:F0:0D:F0:0D";
    pub const UNKNOWN: &str = "00:11:22:33:44:55";

    pub fn body(address: &str, timestamp: &str) -> String {
        format!(
            r#"{{
                "device": {{"address": "{address}", "type": "RAWv2"}},
                "rssi": -75,
                "timestamp": {timestamp},
                "sensors": {{
                    "humidity": 45.5, "temperature": 21.3, "pressure": 100512,
                    "accelerationX": -0.02, "accelerationY": 0.01, "accelerationZ": 1.0,
                    "voltage": 2.995, "txPower": 4, "movementCount": 12, "sequence": 345
                }}
            }}"#
        )
    }

    pub fn reading_body(address: &str) -> String {
        body(address, r#""2026-10-19T08:15:30Z""#)
    }

    pub fn container(bodies: &[String]) -> Vec<u8> {
        let mut writer = CaptureWriter::new().with_deflate();
        for (seq, body) in bodies.iter().enumerate() {
            writer.push(
                CaptureEvent::new(seq as i64, body.clone())
                    .with_enqueued_time_utc("10/19/2026 8:15:31 AM"),
            );
        }
        writer.into_bytes().unwrap()
    }

    pub fn store() -> InMemoryTelemetryStore {
        let store = InMemoryTelemetryStore::new();
        store.register_device(&DeviceAddress::parse(KNOWN).unwrap(), DeviceId(1));
        store.register_device(&DeviceAddress::parse(OTHER_KNOWN).unwrap(), DeviceId(2));
        store
    }
}

#[cfg(test)]
mod scenario_tests {
    use super::fixtures::*;
    use contracts::{BatchError, DecodeError, DeviceId, StorageError};
    use pipeline::BatchPipeline;

    #[tokio::test]
    async fn test_single_valid_entry_is_persisted() {
        let store = store();
        let bytes = container(&[reading_body(KNOWN)]);

        let outcome = BatchPipeline::default()
            .process("scenario-a", bytes.as_slice(), &store)
            .await;

        assert!(!outcome.failed());
        assert_eq!(outcome.decoded, 1);
        assert_eq!(outcome.parsed, 1);
        assert_eq!(outcome.persisted, 1);
        assert_eq!(outcome.skipped_total(), 0);

        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].device_id, DeviceId(1));
        assert_eq!(rows[0].parameters.temperature, 21.3);
        assert_eq!(rows[0].parameters.pressure, 100_512);
        assert_eq!(rows[0].parameters.battery_mv, 2995);
        assert_eq!(rows[0].parameters.tx_power, 4);
    }

    #[tokio::test]
    async fn test_entry_without_address_is_skipped() {
        let store = store();
        let missing_address = r#"{"device": {"type": "RAWv2"}, "sensors": {"temperature": 20.0}}"#;
        let bytes = container(&[reading_body(KNOWN), missing_address.to_string()]);

        let outcome = BatchPipeline::default()
            .process("scenario-b", bytes.as_slice(), &store)
            .await;

        assert!(!outcome.failed());
        assert_eq!(outcome.decoded, 2);
        assert_eq!(outcome.parsed, 1);
        assert_eq!(outcome.persisted, 1);
        assert_eq!(outcome.skipped_total(), 1);
        assert_eq!(outcome.skipped.payload_parse, 1);
    }

    #[tokio::test]
    async fn test_corrupt_header_fails_batch() {
        let store = store();
        let mut bytes = container(&[reading_body(KNOWN)]);
        bytes[0] = b'X';

        let outcome = BatchPipeline::default()
            .process("scenario-c", bytes.as_slice(), &store)
            .await;

        assert!(outcome.failed());
        assert!(matches!(outcome.container_error, Some(DecodeError::Header { .. })));
        assert_eq!(outcome.persisted, 0);
        assert_eq!(store.stats().lookups, 0);
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_loss_mid_transaction_rolls_back() {
        let store = store().fail_insert_at(3);
        let bytes = container(&[
            reading_body(KNOWN),
            reading_body(OTHER_KNOWN),
            reading_body(KNOWN),
            reading_body(KNOWN),
        ]);

        let outcome = BatchPipeline::default()
            .process("scenario-d", bytes.as_slice(), &store)
            .await;

        assert!(outcome.failed());
        assert_eq!(outcome.persisted, 0);
        assert!(matches!(
            outcome.batch_error,
            Some(BatchError::Storage(StorageError::Connection { .. }))
        ));
        assert_eq!(store.row_count(), 0);
        assert_eq!(store.stats().commits, 0);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_no_rows() {
        let store = store().fail_commit();
        let bytes = container(&[reading_body(KNOWN), reading_body(KNOWN)]);

        let outcome = BatchPipeline::default()
            .process("commit-lost", bytes.as_slice(), &store)
            .await;

        assert!(outcome.failed());
        assert_eq!(outcome.persisted, 0);
        assert_eq!(store.row_count(), 0);
    }
}

#[cfg(test)]
mod property_tests {
    use super::fixtures::*;
    use chrono::{DateTime, TimeZone, Utc};
    use contracts::{DeviceAddress, TelemetryStore, TelemetryTransaction};
    use ingestion::{CaptureEvent, CaptureWriter};
    use pipeline::BatchPipeline;

    #[test]
    fn test_decoded_equals_entries_and_parse_accounts_for_all() {
        for size in [1usize, 2, 7, 50, 301] {
            let bodies: Vec<String> = (0..size)
                .map(|i| match i % 4 {
                    0 => "not json".to_string(),
                    1 => r#"{"sensors": {"temperature": 1}}"#.to_string(),
                    _ => reading_body(KNOWN),
                })
                .collect();
            let bytes = container(&bodies);

            let batch = BatchPipeline::default().decode("prop", bytes.as_slice());
            assert!(batch.container_error.is_none());
            assert_eq!(batch.decoded, size as u64);
            assert_eq!(
                batch.readings.len() as u64 + batch.skipped.payload_parse,
                batch.decoded
            );
        }
    }

    #[tokio::test]
    async fn test_storage_error_always_means_zero_persisted() {
        for fail_at in 1..=5 {
            let store = store().fail_insert_at(fail_at);
            let bodies: Vec<String> = (0..5).map(|_| reading_body(KNOWN)).collect();
            let bytes = container(&bodies);

            let outcome = BatchPipeline::default()
                .process("atomic", bytes.as_slice(), &store)
                .await;

            assert!(outcome.failed(), "fail_at={fail_at}");
            assert_eq!(outcome.persisted, 0);
            assert_eq!(store.row_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_captured_at_preserved_exactly() {
        let store = store();
        let bodies = vec![
            body(KNOWN, r#""2026-10-19T08:15:30.123456Z""#),
            body(KNOWN, r#""2026-10-19T10:15:30.654321+02:00""#),
            body(KNOWN, "1792397730.25"),
            body(KNOWN, "1792397730250"),
        ];
        let bytes = container(&bodies);

        let outcome = BatchPipeline::default()
            .process("time", bytes.as_slice(), &store)
            .await;
        assert_eq!(outcome.persisted, 4);

        let base = Utc.with_ymd_and_hms(2026, 10, 19, 8, 15, 30).unwrap();
        let expected: Vec<DateTime<Utc>> = vec![
            base + chrono::Duration::microseconds(123_456),
            base + chrono::Duration::microseconds(654_321),
            base + chrono::Duration::milliseconds(250),
            base + chrono::Duration::milliseconds(250),
        ];
        let captured: Vec<_> = store.rows().iter().map(|row| row.captured_at).collect();
        assert_eq!(captured, expected);
    }

    #[tokio::test]
    async fn test_unresolved_devices_skipped_rest_committed() {
        let store = store();
        let bytes = container(&[
            reading_body(KNOWN),
            reading_body(UNKNOWN),
            reading_body(OTHER_KNOWN),
            reading_body(UNKNOWN),
            reading_body(KNOWN),
        ]);

        let outcome = BatchPipeline::default()
            .process("unresolved", bytes.as_slice(), &store)
            .await;

        assert!(!outcome.failed());
        assert_eq!(outcome.parsed, 5);
        assert_eq!(outcome.persisted, 3);
        assert_eq!(outcome.skipped.unresolved_device, 2);
        assert_eq!(outcome.skipped_total(), 2);
        assert_eq!(store.row_count(), 3);
        assert_eq!(store.stats().commits, 1);
    }

    #[tokio::test]
    async fn test_redelivery_inserts_duplicate_rows() {
        let store = store();
        let bytes = container(&[reading_body(KNOWN), reading_body(OTHER_KNOWN)]);
        let pipeline = BatchPipeline::default();

        let first = pipeline.process("delivery", bytes.as_slice(), &store).await;
        let second = pipeline.process("delivery", bytes.as_slice(), &store).await;

        assert_eq!(first.persisted, 2);
        assert_eq!(second.persisted, 2);
        let rows = store.rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], rows[2]);
        assert_eq!(rows[1], rows[3]);
    }

    #[tokio::test]
    async fn test_abandoned_transaction_discards_writes() {
        let store = store();
        {
            let mut tx = store.begin().await.unwrap();
            let address = DeviceAddress::parse(KNOWN).unwrap();
            let id = tx.resolve_device(&address).await.unwrap().unwrap();
            let reading = telemetry_parser::parse_reading(reading_body(KNOWN).as_bytes()).unwrap();
            tx.insert_row(&contracts::PersistedRow::from_reading(id, &reading))
                .await
                .unwrap();
        }

        assert_eq!(store.row_count(), 0);
        assert_eq!(store.stats().abandoned, 1);
    }

    #[tokio::test]
    async fn test_malformed_envelopes_counted_separately() {
        let mut writer = CaptureWriter::new();
        writer
            .push(CaptureEvent::new(0, reading_body(KNOWN)))
            .push(CaptureEvent::new(1, "").without_body())
            .push(CaptureEvent::new(2, reading_body(KNOWN)));
        let bytes = writer.into_bytes().unwrap();

        let store = store();
        let outcome = BatchPipeline::default()
            .process("malformed", bytes.as_slice(), &store)
            .await;

        assert!(!outcome.failed());
        assert_eq!(outcome.decoded, 3);
        assert_eq!(outcome.skipped.malformed_envelope, 1);
        assert_eq!(outcome.persisted, 2);
    }
}

#[cfg(test)]
mod config_tests {
    use super::fixtures::*;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{BatchError, UnresolvedDevicePolicy};
    use pipeline::{run_batches, BatchPipeline, DeliveredBatch};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[tokio::test]
    async fn test_fail_batch_policy_from_config() {
        let config = ConfigLoader::load_from_str(
            r#"
            [pipeline]
            unresolved_device = "fail_batch"
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(config.pipeline.unresolved_device, UnresolvedDevicePolicy::FailBatch);

        let store = store();
        let bytes = container(&[reading_body(KNOWN), reading_body(UNKNOWN)]);
        let outcome = BatchPipeline::from_settings(&config.pipeline)
            .process("policy", bytes.as_slice(), &store)
            .await;

        assert!(outcome.failed());
        assert!(matches!(outcome.batch_error, Some(BatchError::DeviceResolution(_))));
        assert_eq!(outcome.persisted, 0);
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn test_run_batches_with_configured_concurrency() {
        let config = ConfigLoader::load_from_str(
            r#"{"pipeline": {"concurrency": 2}}"#,
            ConfigFormat::Json,
        )
        .unwrap();

        let store = store();
        let good = container(&[reading_body(KNOWN), reading_body(OTHER_KNOWN)]);
        let batches = vec![
            DeliveredBatch::from_bytes("a", good.clone()),
            DeliveredBatch::from_bytes("b", b"Obj\x01 truncated".to_vec()),
            DeliveredBatch::from_bytes("c", good),
        ];

        let stats = run_batches(
            BatchPipeline::from_settings(&config.pipeline),
            store.clone(),
            batches,
            config.pipeline.concurrency,
        )
        .await;

        assert_eq!(stats.outcomes.len(), 3);
        assert_eq!(stats.failed_batches(), 1);
        assert!(stats.outcomes[1].container_error.is_some());
        assert_eq!(store.row_count(), 4);

        let summary = stats.summary();
        assert_eq!(summary.persisted, 4);
        assert_eq!(summary.failures.get("decode"), Some(&1));
    }

    #[test]
    fn test_observability_config_from_file_settings() {
        let config = ConfigLoader::load_from_str(
            r#"
            [observability]
            log_format = "json"
            metrics_port = 9464
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let observability = observability::ObservabilityConfig::from(&config.observability);
        assert_eq!(observability.metrics_port, Some(9464));
        assert_eq!(observability.log_format, contracts::LogFormat::Json);
    }
}
