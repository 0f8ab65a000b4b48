use polars::prelude::*;
use rule_summary::conf::SummarizerConfig;
use rule_summary::rules::Rule;
use rule_summary::scorer::Scorer;
use rule_summary::summarizer::TableSummarizer;
use rule_summary::table::{BucketScheme, BucketSpec, Table};
use std::time::Instant;

fn generate_sessions(n_rows: usize) -> DataFrame {
    let mut city: Vec<Option<&str>> = Vec::with_capacity(n_rows);
    let mut plan: Vec<Option<&str>> = Vec::with_capacity(n_rows);
    let mut device: Vec<Option<&str>> = Vec::with_capacity(n_rows);
    let mut minutes: Vec<Option<i64>> = Vec::with_capacity(n_rows);

    for i in 0..n_rows {
        city.push(Some(match i % 10 {
            0..=4 => "paris",
            5..=7 => "lyon",
            _ => "nice",
        }));
        // paid plans cluster in paris
        let paid = i % 10 < 3 || i % 7 == 0;
        plan.push(if i % 31 == 0 {
            None
        } else if paid {
            Some("pro")
        } else {
            Some("free")
        });
        device.push(Some(if i % 3 == 0 { "ios" } else { "android" }));
        minutes.push(Some(((i * 17) % 90) as i64));
    }

    let plan_utf8 = Series::new(PlSmallStr::from_static("plan"), plan);
    let cats = FrozenCategories::new(["free", "pro"]).unwrap();
    let plan_enum = plan_utf8
        .cast(&DataType::from_frozen_categories(cats))
        .unwrap();

    let cols: Vec<Column> = vec![
        Series::new(PlSmallStr::from_static("city"), city).into(),
        plan_enum.into(),
        Series::new(PlSmallStr::from_static("device"), device).into(),
        Series::new(PlSmallStr::from_static("minutes"), minutes).into(),
    ];
    DataFrame::new(cols).unwrap()
}

fn main() {
    env_logger::init();
    println!("=== Rule Summary Drill-Down (Polars) ===");

    let df = generate_sessions(5000);
    println!(
        "DataFrame shape: {{ rows: {}, cols: {} }}",
        df.height(),
        df.width()
    );

    // minutes is numeric: bucket it before summarizing
    let mut table = Table::from_dataframe(&df).unwrap();
    table
        .bucketize(&[BucketSpec {
            column: 3,
            buckets: 3,
            scheme: BucketScheme::EqualPopulation,
        }])
        .unwrap();

    let config = SummarizerConfig {
        scorer: Scorer::Size,
        rule_nums: 4,
        max_score: 3,
        ..SummarizerConfig::default()
    };
    let mut summarizer = TableSummarizer::new(config);

    let start_time = Instant::now();
    summarizer.fit_table(table).unwrap();
    let top = summarizer.summarize().unwrap();
    println!("Summarizing took: {:?}", start_time.elapsed());

    let table = summarizer.table().unwrap();
    println!("\nTop rules:");
    for (i, r) in top.iter().enumerate() {
        println!(
            "  {:>2}. {:<40} count={:<6} score={} marginal={}",
            i,
            r.rule.sparse_string(table),
            r.count(),
            r.score(),
            r.marginal_value()
        );
    }

    // drill into the first rule, then into the city column of the root
    if let Some(first) = top.first().map(|r| r.rule.clone()) {
        summarizer.expand(&first).unwrap();
    }
    summarizer.expand_star(&Rule::empty(4), 0).unwrap();
    println!("\n{}", summarizer.tree_info());

    println!("Static drill-down over city then plan:");
    let tree = summarizer.drill_down(&top, &[0, 1]).unwrap();
    print!("{}", tree.outline());
}
