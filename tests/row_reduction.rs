//! Deduplication and row sampling.

use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use ironsieve::filters::reduce::{drop_duplicate_rows, sample_rows};
use ironsieve::filters::sampling_rng;
use ironsieve::testing::{assert_rows_unique, string_table, text_with_ids, wide_table};
use std::collections::HashSet;
use std::sync::Arc;

#[test]
fn duplicates_keep_first_occurrence_in_order() -> anyhow::Result<()> {
    let table = RecordBatch::try_from_iter(vec![
        ("k", Arc::new(StringArray::from(vec!["a", "b", "a", "c", "b"])) as ArrayRef),
        ("n", Arc::new(Int64Array::from(vec![1, 2, 1, 3, 9])) as ArrayRef),
    ])?;
    let out = drop_duplicate_rows(&table)?;

    assert_eq!(out.num_rows(), 4);
    let k = out.column(0).as_any().downcast_ref::<StringArray>().unwrap();
    let n = out.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
    let rows: Vec<(&str, i64)> = (0..out.num_rows()).map(|i| (k.value(i), n.value(i))).collect();
    assert_eq!(rows, vec![("a", 1), ("b", 2), ("c", 3), ("b", 9)]);
    assert_rows_unique(&out);
    Ok(())
}

#[test]
fn null_and_empty_string_are_different_values() -> anyhow::Result<()> {
    let table = string_table(&[("v", vec![None, Some(""), None, Some("")])])?;
    let out = drop_duplicate_rows(&table)?;
    assert_eq!(out.num_rows(), 2);
    assert!(out.column(0).is_null(0));
    assert!(!out.column(0).is_null(1));
    Ok(())
}

#[test]
fn sampling_returns_exactly_n_distinct_rows() -> anyhow::Result<()> {
    let table = text_with_ids(&(0..50).map(|_| "t").collect::<Vec<_>>())?;
    let mut rng = sampling_rng(None);
    let out = sample_rows(&table, 10, &mut rng)?;

    assert_eq!(out.num_rows(), 10);
    let ids = out.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
    let distinct: HashSet<i64> = ids.values().iter().copied().collect();
    assert_eq!(distinct.len(), 10);
    assert!(distinct.iter().all(|id| (0..50).contains(id)));
    Ok(())
}

#[test]
fn sampling_below_limit_is_identity() -> anyhow::Result<()> {
    let table = wide_table(5, 2)?;
    let out = sample_rows(&table, 5, &mut sampling_rng(Some(1)))?;
    assert_eq!(out, table);
    Ok(())
}

#[test]
fn seeded_sampling_is_reproducible() -> anyhow::Result<()> {
    let table = wide_table(100, 3)?;
    let a = sample_rows(&table, 7, &mut sampling_rng(Some(42)))?;
    let b = sample_rows(&table, 7, &mut sampling_rng(Some(42)))?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn sampling_to_zero_yields_empty_table() -> anyhow::Result<()> {
    let table = wide_table(3, 2)?;
    let out = sample_rows(&table, 0, &mut sampling_rng(Some(3)))?;
    assert_eq!(out.num_rows(), 0);
    assert_eq!(out.num_columns(), 2);
    Ok(())
}
