//! Column validation: exclusion criteria and threshold monotonicity.

use ironsieve::filters::columns::{
    ColumnThresholds, ColumnVerdict, column_stats, fetch_names_of_valid_columns, is_null_like,
    sample_columns, valid_column_indices,
};
use ironsieve::testing::string_table;
use ironsieve::FilterConfig;
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;

fn defaults() -> (ColumnThresholds, Vec<String>) {
    let cfg = FilterConfig::default();
    (ColumnThresholds::from(&cfg), cfg.null_like_values)
}

#[test]
fn keeps_only_columns_passing_every_check() -> anyhow::Result<()> {
    let long_header = "h".repeat(300);
    let table = string_table(&[
        ("ok", vec![Some("a"), Some("b"), Some("c"), Some("d")]),
        (long_header.as_str(), vec![Some("a"), Some("b"), Some("c"), Some("d")]),
        ("constant", vec![Some("x"), Some("x"), Some("x"), Some("x")]),
        ("sparse", vec![Some("a"), Some("N/A"), None, Some("b")]),
    ])?;
    let (t, sentinels) = defaults();

    let names = fetch_names_of_valid_columns(&table, &t, &sentinels)?;
    assert_eq!(names, vec!["ok".to_string()]);

    let stats = column_stats(&table, &sentinels)?;
    assert_eq!(stats[1].verdict(&t), ColumnVerdict::HeaderTooLong(300));
    assert_eq!(stats[2].verdict(&t), ColumnVerdict::TooFewUnique(1));
    assert_eq!(stats[3].verdict(&t), ColumnVerdict::TooManyNullLike(0.5));
    Ok(())
}

#[test]
fn header_length_counts_characters() -> anyhow::Result<()> {
    let table = string_table(&[("ééé", vec![Some("a"), Some("b")])])?;
    let t = ColumnThresholds {
        max_header_len_chars: 3,
        min_unique_column_values: 1,
        max_null_like_frac: 1.0,
    };
    assert_eq!(valid_column_indices(&table, &t, &[])?, vec![0]);
    Ok(())
}

#[test]
fn zero_row_table_has_no_unique_values() -> anyhow::Result<()> {
    let table = string_table(&[("empty", vec![])])?;
    let (t, sentinels) = defaults();
    let stats = column_stats(&table, &sentinels)?;
    assert_eq!(stats[0].unique_values, 0);
    assert!(stats[0].null_like_frac().abs() < f64::EPSILON);
    assert!(valid_column_indices(&table, &t, &sentinels)?.is_empty());
    Ok(())
}

#[test]
fn column_sampling_draws_distinct_indices() {
    let mut rng = StdRng::seed_from_u64(7);
    let picked = sample_columns(10, 4, &mut rng);
    assert_eq!(picked.len(), 4);
    assert_eq!(picked.iter().collect::<HashSet<_>>().len(), 4);
    assert!(picked.iter().all(|&i| i < 10));

    assert_eq!(sample_columns(3, 4, &mut rng), vec![0, 1, 2]);
}

const ALPHABET: &[&str] = &["", "NA", "-", "a", "b", "c", "d"];

fn column_strategy() -> impl Strategy<Value = (String, Vec<Option<usize>>)> {
    (
        "[a-z]{1,12}",
        prop::collection::vec(prop::option::weighted(0.85, 0..ALPHABET.len()), 6),
    )
}

fn thresholds_strategy() -> impl Strategy<Value = ColumnThresholds> {
    (1usize..14, 0usize..6, 0.0..=1.0f64).prop_map(|(h, u, f)| ColumnThresholds {
        max_header_len_chars: h,
        min_unique_column_values: u,
        max_null_like_frac: f,
    })
}

fn build(
    columns: &[(String, Vec<Option<usize>>)],
) -> anyhow::Result<arrow::record_batch::RecordBatch> {
    let owned: Vec<(String, Vec<Option<&str>>)> = columns
        .iter()
        .enumerate()
        .map(|(i, (name, cells))| {
            (
                format!("{name}{i}"),
                cells.iter().map(|c| c.map(|k| ALPHABET[k])).collect(),
            )
        })
        .collect();
    let borrowed: Vec<(&str, Vec<Option<&str>>)> = owned
        .iter()
        .map(|(n, v)| (n.as_str(), v.clone()))
        .collect();
    Ok(string_table(&borrowed)?)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// A column is excluded exactly when one of the three checks fails.
    #[test]
    fn excluded_iff_a_check_fails(
        columns in prop::collection::vec(column_strategy(), 1..6),
        t in thresholds_strategy(),
    ) {
        let table = build(&columns).unwrap();
        let sentinels: Vec<String> = ["NA", "-"].iter().map(ToString::to_string).collect();
        let valid: HashSet<usize> = valid_column_indices(&table, &t, &sentinels).unwrap().into_iter().collect();

        for (i, field) in table.schema().fields().iter().enumerate() {
            let cells: Vec<Option<&str>> = columns[i].1.iter().map(|c| c.map(|k| ALPHABET[k])).collect();
            let null_like = cells.iter().filter(|c| is_null_like(**c, &sentinels)).count();
            let unique: HashSet<&str> = cells
                .iter()
                .filter(|c| !is_null_like(**c, &sentinels))
                .filter_map(|c| *c)
                .collect();
            #[allow(clippy::cast_precision_loss)]
            let frac = null_like as f64 / cells.len() as f64;
            let expected = field.name().chars().count() <= t.max_header_len_chars
                && unique.len() >= t.min_unique_column_values
                && frac <= t.max_null_like_frac;
            prop_assert_eq!(valid.contains(&i), expected, "column {}", field.name());
        }
    }

    /// Loosening any threshold never shrinks the valid set.
    #[test]
    fn loosening_thresholds_never_shrinks_valid_set(
        columns in prop::collection::vec(column_strategy(), 1..6),
        t in thresholds_strategy(),
        extra_header in 0usize..5,
        fewer_unique in 0usize..3,
        extra_frac in 0.0..=0.5f64,
    ) {
        let table = build(&columns).unwrap();
        let sentinels: Vec<String> = ["NA", "-"].iter().map(ToString::to_string).collect();
        let loose = ColumnThresholds {
            max_header_len_chars: t.max_header_len_chars + extra_header,
            min_unique_column_values: t.min_unique_column_values.saturating_sub(fewer_unique),
            max_null_like_frac: (t.max_null_like_frac + extra_frac).min(1.0),
        };
        let strict: HashSet<usize> = valid_column_indices(&table, &t, &sentinels).unwrap().into_iter().collect();
        let relaxed: HashSet<usize> = valid_column_indices(&table, &loose, &sentinels).unwrap().into_iter().collect();
        prop_assert!(strict.is_subset(&relaxed), "strict {:?} not within relaxed {:?}", strict, relaxed);
    }
}
