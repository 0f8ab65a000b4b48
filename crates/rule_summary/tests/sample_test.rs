use rand::rngs::StdRng;
use rand::SeedableRng;
use rule_summary::rules::{Rule, RuleStats, ScoredRule};
use rule_summary::sample::TableSample;
use rule_summary::sample_handler::SampleHandler;
use rule_summary::scorer::Scorer;
use rule_summary::table::Table;
use std::borrow::Cow;

/// Deterministic table: column 0 has 2 values, column 1 has 4, column 2 has 5.
fn build_table(n: usize) -> Table {
    let rows: Vec<Vec<String>> = (0..n)
        .map(|i| {
            vec![
                format!("a{}", i % 2),
                format!("b{}", (i / 2) % 4),
                format!("c{}", (i * 7) % 5),
            ]
        })
        .collect();
    Table::from_rows(&["a", "b", "c"], rows).unwrap()
}

fn sample_count(sample: &TableSample, rule: &Rule) -> u64 {
    sample.tuples().filter(|t| sample.covers(rule, t)).count() as u64
}

#[test]
fn test_small_population_is_sampled_exactly() {
    let table = build_table(40);
    let mut rng = StdRng::seed_from_u64(1);
    let filter = Rule::from_pairs(3, &[(0, 0)]).unwrap();
    let sample = TableSample::create(&table, &filter, 100, &mut rng).unwrap();

    assert_eq!(sample.len(), 20);
    assert_eq!(sample.total_count(), 20);
    assert!(sample.is_exact());
    assert_eq!(sample.sample_fraction(), 1.0);
    assert_eq!(sample.width(), 2);
    assert_eq!(sample.column_mapping(), &[1, 2]);
    assert_eq!(sample.reverse_column_mapping(), &[None, Some(0), Some(1)]);
    assert_eq!(sample.local_column(0), None);
    assert!(sample.tuples().all(|t| t.len() == 2));
}

#[test]
fn test_reservoir_keeps_requested_size() {
    let table = build_table(1000);
    let mut rng = StdRng::seed_from_u64(2);
    let sample = TableSample::create(&table, &Rule::empty(3), 50, &mut rng).unwrap();
    assert_eq!(sample.len(), 50);
    assert_eq!(sample.total_count(), 1000);
    assert!(!sample.is_exact());
    assert!((sample.sample_fraction() - 0.05).abs() < 1e-12);
}

#[test]
fn test_sample_keeps_duplicate_rows() {
    let rows = vec![["x", "y"]; 30];
    let table = Table::from_rows(&["a", "b"], rows).unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let sample = TableSample::create(&table, &Rule::empty(2), 10, &mut rng).unwrap();
    assert_eq!(sample.len(), 10);
    assert_eq!(sample.expand_count(sample.len() as u64), 30);
}

#[test]
fn test_rule_translation_round_trip() {
    let table = build_table(100);
    let mut rng = StdRng::seed_from_u64(4);
    let filter = Rule::from_pairs(3, &[(1, 2)]).unwrap();
    let sample = TableSample::create(&table, &filter, 10, &mut rng).unwrap();

    let rule = Rule::from_pairs(3, &[(0, 1), (1, 2)]).unwrap();
    let local = sample.truncate_rule(&rule);
    assert_eq!(local.len(), 2);
    assert_eq!(local.values(), &[1, -1]);
    assert_eq!(sample.expand_rule(&local), rule);
    // counts scale by the sample fraction
    assert_eq!(sample.expand_count(sample.len() as u64), sample.total_count());
    assert_eq!(sample.truncate_count(sample.total_count()), sample.len() as u64);
}

#[test]
fn test_expand_scored_rescores_against_the_table() {
    let table = build_table(100);
    let mut rng = StdRng::seed_from_u64(5);
    let filter = Rule::from_pairs(3, &[(0, 0)]).unwrap();
    let sample = TableSample::create(&table, &filter, 10, &mut rng).unwrap();
    assert_eq!(sample.total_count(), 50);

    let local = Rule::new(vec![1, -1]).unwrap();
    let stats = RuleStats {
        count: 2,
        score: 2,
        counted: true,
        latest_counted_marginal_value: 4,
        min_marginal_value: 4,
        max_marginal_value: 4,
    };
    let expanded = sample.expand_scored(&table, &Scorer::Size, &ScoredRule::new(local, stats));
    assert_eq!(expanded.rule, Rule::from_pairs(3, &[(0, 0), (1, 1)]).unwrap());
    assert_eq!(expanded.score(), 2);
    assert_eq!(expanded.count(), 10);
    assert_eq!(expanded.marginal_value(), 20);
}

#[test]
fn test_create_filtered_narrows_the_sample() {
    let table = build_table(200);
    let mut rng = StdRng::seed_from_u64(6);
    let exact = TableSample::create(&table, &Rule::empty(3), 1000, &mut rng).unwrap();
    let narrow = Rule::from_pairs(3, &[(0, 1), (2, 3)]).unwrap();
    let derived = exact.create_filtered(&narrow).unwrap();

    assert_eq!(derived.filter(), &narrow);
    assert_eq!(derived.width(), 1);
    assert_eq!(derived.total_count(), table.count(&narrow).unwrap());
    assert_eq!(derived.len() as u64, table.count(&narrow).unwrap());

    let unrelated = Rule::from_pairs(3, &[(0, 0)]).unwrap();
    assert!(derived.create_filtered(&unrelated).is_err());
}

#[test]
fn test_sampled_estimates_converge() {
    let table = build_table(2000);
    let rule = Rule::from_pairs(3, &[(1, 1), (2, 2)]).unwrap();
    let exact = table.count(&rule).unwrap() as f64;
    let mut rng = StdRng::seed_from_u64(7);

    let mean_error = |size: usize, rng: &mut StdRng| -> f64 {
        let trials = 30;
        let total: f64 = (0..trials)
            .map(|_| {
                let sample = TableSample::create(&table, &Rule::empty(3), size, &mut *rng).unwrap();
                let estimate = sample.expand_count(sample_count(&sample, &rule)) as f64;
                (estimate - exact).abs()
            })
            .sum();
        total / trials as f64
    };

    let coarse = mean_error(100, &mut rng);
    let fine = mean_error(1500, &mut rng);
    let full = mean_error(2000, &mut rng);
    assert!(fine < coarse, "fine {fine} coarse {coarse}");
    assert_eq!(full, 0.0);
}

#[test]
fn test_handler_reuses_identical_filter() {
    let table = build_table(500);
    let mut handler = SampleHandler::new(10_000, 100, 50, 11);
    let filter = Rule::from_pairs(3, &[(0, 0)]).unwrap();

    let first = handler.get_sample_for_rule(&table, &filter).unwrap().unwrap();
    assert!(matches!(first, Cow::Borrowed(_)));
    let first_len = first.len();
    let second = handler.get_sample_for_rule(&table, &filter).unwrap().unwrap();
    assert!(matches!(second, Cow::Borrowed(_)));
    assert_eq!(second.len(), first_len);
    assert_eq!(handler.samples().len(), 1);
}

#[test]
fn test_handler_narrows_a_broader_sample() {
    let table = build_table(2000);
    let mut handler = SampleHandler::new(100_000, 1000, 100, 12);
    handler
        .get_sample_for_rule(&table, &Rule::empty(3))
        .unwrap()
        .unwrap();
    assert_eq!(handler.samples().len(), 1);

    // about half of the broad sample survives, well over 100 rows
    let narrow = Rule::from_pairs(3, &[(0, 1)]).unwrap();
    let derived = handler.get_sample_for_rule(&table, &narrow).unwrap().unwrap();
    assert_eq!(derived.filter(), &narrow);
    assert!(derived.len() > 100);
    assert!(derived.len() < 1000);
    assert_eq!(handler.samples().len(), 2);
    assert_eq!(handler.current_rows(), 1000 + handler.samples()[1].len());
}

#[test]
fn test_handler_reports_exhaustion() {
    let table = build_table(500);
    let mut handler = SampleHandler::new(150, 100, 100, 13);
    let first = Rule::from_pairs(3, &[(0, 0)]).unwrap();
    assert!(handler.get_sample_for_rule(&table, &first).unwrap().is_some());

    let other = Rule::from_pairs(3, &[(1, 3)]).unwrap();
    assert!(handler.get_sample_for_rule(&table, &other).unwrap().is_none());
    handler.clear();
    assert!(handler.get_sample_for_rule(&table, &other).unwrap().is_some());
}

#[test]
fn test_handler_is_reproducible() {
    let table = build_table(1000);
    let filter = Rule::from_pairs(3, &[(2, 1)]).unwrap();
    let rows = |seed: u64| {
        let mut handler = SampleHandler::new(10_000, 30, 30, seed);
        let sample = handler.get_sample_for_rule(&table, &filter).unwrap().unwrap();
        sample.tuples().map(|t| t.to_vec()).collect::<Vec<_>>()
    };
    assert_eq!(rows(21), rows(21));
}
