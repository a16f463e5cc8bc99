//! End-to-end behavior of the per-record pipeline.

use arrow::compute::concat_batches;
use ironsieve::testing::{
    CountingDetector, assert_column_names, corrupt_record, ipc_record, string_table, wide_table,
};
use ironsieve::{FilterConfig, ProcessOutcome, Record, RecordProcessor, RejectReason, SieveError, Stage};
use std::collections::HashSet;

fn kept(outcome: ProcessOutcome) -> arrow::record_batch::RecordBatch {
    match outcome {
        ProcessOutcome::Kept(t) => t,
        ProcessOutcome::Rejected(reason) => panic!("record rejected: {reason}"),
    }
}

#[test]
fn too_few_rows_after_filtering_is_rejected() -> anyhow::Result<()> {
    let table = string_table(&[
        ("a", vec![Some("one"), Some("spam"), Some("two"), Some("spam!"), Some("three")]),
        ("b", vec![Some("x"), Some("y"), Some("z"), Some("w"), Some("v")]),
    ])?;
    let cfg = FilterConfig::default()
        .with_forbidden_substrings(["spam"])
        .with_min_rows(Some(5));
    let outcome = RecordProcessor::new(cfg).process(table)?;
    assert_eq!(
        outcome,
        ProcessOutcome::Rejected(RejectReason::TooFewRows { rows: 3, min_rows: 5 })
    );
    Ok(())
}

#[test]
fn column_sampling_keeps_exactly_max_cols() -> anyhow::Result<()> {
    let table = wide_table(8, 6)?;
    let cfg = FilterConfig::default().with_max_cols(3);
    let out = kept(RecordProcessor::new(cfg).process(table.clone())?);

    assert_eq!(out.num_columns(), 3);
    assert_eq!(out.num_rows(), 8);
    let original: HashSet<String> = table.schema().fields().iter().map(|f| f.name().clone()).collect();
    let names: HashSet<String> = out.schema().fields().iter().map(|f| f.name().clone()).collect();
    assert_eq!(names.len(), 3);
    assert!(names.is_subset(&original));
    Ok(())
}

#[test]
fn invalid_columns_are_dropped_before_row_filters() -> anyhow::Result<()> {
    let table = string_table(&[
        ("id", vec![Some("1"), Some("2"), Some("3")]),
        ("constant", vec![Some("same"), Some("same"), Some("same")]),
        ("name", vec![Some("ann"), Some("bo"), Some("cy")]),
    ])?;
    let out = kept(RecordProcessor::new(FilterConfig::default()).process(table)?);
    assert_column_names(&out, &["id", "name"]);
    assert_eq!(out.num_rows(), 3);
    Ok(())
}

#[test]
fn no_valid_columns_is_rejected() -> anyhow::Result<()> {
    let table = string_table(&[("constant", vec![Some("x"), Some("x")])])?;
    let outcome = RecordProcessor::new(FilterConfig::default()).process(table)?;
    assert_eq!(outcome.reject_reason(), Some(RejectReason::NoValidColumns));
    Ok(())
}

#[test]
fn sampling_to_zero_rows_is_a_rejection() -> anyhow::Result<()> {
    let cfg = FilterConfig::default().with_max_output_rows(0);
    let outcome = RecordProcessor::new(cfg).process(wide_table(5, 2)?)?;
    assert_eq!(
        outcome.reject_reason(),
        Some(RejectReason::Emptied { stage: Stage::RowSampling })
    );
    Ok(())
}

#[test]
fn forged_payload_lengths_are_decode_errors() {
    let processor = RecordProcessor::new(FilterConfig::default());

    let stream = Record::from_arrow_bytes("stream", vec![0xFF, 0xFF, 0xFF, 0xFF, 0xF0, 0xFF, 0xFF, 0x7F]);
    let err = processor.process_record(&stream).unwrap_err();
    assert!(matches!(&err, SieveError::Decode { content_hash, .. } if content_hash == "stream"));

    let mut file = b"ARROW1\0\0".to_vec();
    file.extend_from_slice(&i32::MAX.to_le_bytes());
    file.extend_from_slice(b"ARROW1");
    let err = processor
        .process_record(&Record::from_arrow_bytes("file", file))
        .unwrap_err();
    assert!(matches!(&err, SieveError::Decode { content_hash, .. } if content_hash == "file"));
}

#[test]
fn emptied_table_skips_every_later_stage() -> anyhow::Result<()> {
    // every cell of wide_table contains "r"
    let code = CountingDetector::new("r");
    let pii = CountingDetector::new("r");
    let mut cfg = FilterConfig::default();
    cfg.filter_rows_containing_code = true;
    cfg.filter_rows_containing_pii = true;
    let processor = RecordProcessor::new(cfg)
        .with_code_detector(code.clone())
        .with_pii_detector(pii.clone());

    let outcome = processor.process(wide_table(4, 2)?)?;
    assert_eq!(
        outcome,
        ProcessOutcome::Rejected(RejectReason::Emptied { stage: Stage::CodeContent })
    );
    assert!(code.calls() > 0);
    assert_eq!(pii.calls(), 0);
    Ok(())
}

#[test]
fn processing_kept_output_again_is_identity() -> anyhow::Result<()> {
    let base = wide_table(30, 6)?;
    let with_dupes = concat_batches(&base.schema(), [&base, &base.slice(0, 5)])?;
    let cfg = FilterConfig::default()
        .with_max_cols(4)
        .with_max_output_rows(10)
        .with_forbidden_substrings(["r7c"])
        .with_sample_seed(Some(11));
    let processor = RecordProcessor::new(cfg);

    let first = kept(processor.process(with_dupes)?);
    assert_eq!(first.num_columns(), 4);
    assert_eq!(first.num_rows(), 10);

    let second = kept(processor.process(first.clone())?);
    assert_eq!(second, first);
    Ok(())
}

#[test]
fn seeded_processing_is_reproducible() -> anyhow::Result<()> {
    let cfg = FilterConfig::default()
        .with_max_cols(2)
        .with_max_output_rows(5)
        .with_sample_seed(Some(99));
    let processor = RecordProcessor::new(cfg);
    let a = kept(processor.process(wide_table(40, 5)?)?);
    let b = kept(processor.process(wide_table(40, 5)?)?);
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn records_resolve_from_ipc_bytes() -> anyhow::Result<()> {
    let table = wide_table(3, 2)?;
    let processor = RecordProcessor::new(FilterConfig::default());

    let from_bytes = kept(processor.process_record(&ipc_record("h1", &table)?)?);
    assert_eq!(from_bytes, table);

    // the in-memory table wins over bytes
    let mut record = Record::from_table("h2", table.clone());
    record.arrow_bytes = Some(b"garbage".to_vec().into());
    assert_eq!(kept(processor.process_record(&record)?), table);
    Ok(())
}

#[test]
fn undecodable_or_missing_tables_are_errors() {
    let processor = RecordProcessor::new(FilterConfig::default());

    let err = processor.process_record(&corrupt_record("bad")).unwrap_err();
    assert!(matches!(&err, SieveError::Decode { content_hash, .. } if content_hash == "bad"));

    let empty = Record {
        content_hash: "none".into(),
        table: None,
        arrow_bytes: None,
        extra: serde_json::Map::new(),
    };
    let err = processor.process_record(&empty).unwrap_err();
    assert!(matches!(err, SieveError::MissingTable { .. }));
    assert!(err.is_decode());
}
