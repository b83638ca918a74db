#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use hyperloglogplus::{HyperLogLog, HyperLogLogPlus};
use std::hash::BuildHasherDefault;
use tabled::{
    settings::{Settings, Style},
    Table, Tabled,
};
use wyhash::WyHash;
use zetasketch_hll::{HllConfig, HyperLogLogPlusPlus};

#[derive(Tabled)]
struct Record {
    cardinality: usize,
    zetasketch_hll: String,
    hyperloglogplus: String,
}

#[derive(Tabled)]
struct PromotionRecord {
    cardinality: usize,
    representation: &'static str,
    size: usize,
    allocations: String,
}

fn representation(sketch: &HyperLogLogPlusPlus) -> &'static str {
    if sketch.is_dense() {
        "Dense"
    } else if sketch.is_sparse() {
        "Sparse"
    } else {
        "Empty"
    }
}

fn measure_memory_usage<T>(
    cardinality: usize,
    create: impl Fn() -> T,
    insert: impl Fn(&mut T, &u64),
) -> String
where
    T: Sized,
{
    let _profiler = dhat::Profiler::builder().testing().build();
    let mut estimator = create();
    for i in 0..cardinality as u64 {
        insert(&mut estimator, &i);
    }
    let stats = dhat::HeapStats::get();
    format!(
        "{} / {} / {}",
        std::mem::size_of::<T>(),
        stats.total_bytes,
        stats.total_blocks
    )
}

#[test]
fn test_allocations() {
    let results: Vec<Record> = std::iter::once(0)
        .chain((0..).map(|c| 1 << c))
        .take_while(|&c| c <= 1 << 20)
        .map(|cardinality| Record {
            cardinality,
            zetasketch_hll: measure_memory_usage(
                cardinality,
                || HllConfig::default().build().unwrap(),
                |sketch, i| sketch.insert(i).unwrap(),
            ),
            hyperloglogplus: measure_memory_usage(
                cardinality,
                || {
                    HyperLogLogPlus::<u64, _>::new(15, BuildHasherDefault::<WyHash>::default())
                        .unwrap()
                },
                |est, i| est.insert(i),
            ),
        })
        .collect();

    let table_config = Settings::default().with(Style::markdown());
    let markdown = Table::new(results).with(table_config).to_string();
    std::fs::write(
        format!("{}/target/memory_allocations.md", env!("CARGO_MANIFEST_DIR")),
        &markdown,
    )
    .unwrap();
    println!("{}", markdown);

    // sketches of precisions (10, 15) switch from sparse to dense at 769 values
    let results: Vec<PromotionRecord> = (766..=772)
        .map(|cardinality| {
            let _profiler = dhat::Profiler::builder().testing().build();
            let mut sketch = HyperLogLogPlusPlus::new(10, 15).unwrap();
            for i in 0..cardinality as u64 {
                sketch.insert(&i).unwrap();
            }
            let stats = dhat::HeapStats::get();
            PromotionRecord {
                cardinality,
                representation: representation(&sketch),
                size: sketch.size_of(),
                allocations: format!("{} / {}", stats.total_bytes, stats.total_blocks),
            }
        })
        .collect();

    assert_eq!(results[2].representation, "Sparse");
    assert_eq!(results[3].representation, "Dense");
    assert_eq!(results[3].size, 1024);

    let table_config = Settings::default().with(Style::markdown());
    let markdown = Table::new(results).with(table_config).to_string();
    std::fs::write(
        format!("{}/target/promotion_allocations.md", env!("CARGO_MANIFEST_DIR")),
        &markdown,
    )
    .unwrap();
    println!("{}", markdown);
}
