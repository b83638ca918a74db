#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::hash::BuildHasherDefault;

use criterion::measurement::WallTime;
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion, Throughput,
};
use hyperloglogplus::HyperLogLog as HyperLogLogTrait;
use pprof::criterion::{Output, PProfProfiler};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tabled::settings::{Settings, Style};
use tabled::{Table, Tabled};
use wyhash::WyHash;
use zetasketch_hll::{HllConfig, HyperLogLogPlusPlus};

/// Insert, estimate and merge operations are benchmarked against cardinalities ranging from 0 to
/// `DEFAULT_MAX_CARDINALITY` or environment variable `N` (if defined) with cardinality doubled
/// with every iteration as [0, 1, 2, ..., N].
const DEFAULT_MAX_CARDINALITY: usize = 65536;

criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(PProfProfiler::new(100, Output::Protobuf));
    targets = benchmark
}
criterion_main!(benches);

fn benchmark(c: &mut Criterion) {
    let bench_results_path = std::env::var("BENCH_RESULTS_PATH").unwrap_or_else(|_| {
        format!("{}/target", env!("CARGO_MANIFEST_DIR"))
    });
    let max_cardinality = std::env::var("N")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_CARDINALITY);

    let cardinalities: Vec<usize> = std::iter::once(0)
        .chain((0..).map(|c| 1 << c))
        .take_while(|&c| c <= max_cardinality)
        .collect();

    let mut group = c.benchmark_group("insert");
    for &cardinality in &cardinalities {
        group.throughput(Throughput::Elements(cardinality.max(1) as u64));
        bench_insert::<ZetasketchHll>(&mut group, cardinality);
        bench_insert::<HyperLogLogPlus>(&mut group, cardinality);
    }
    group.finish();

    let mut group = c.benchmark_group("estimate");
    group.throughput(Throughput::Elements(1));
    for &cardinality in &cardinalities {
        bench_estimate::<ZetasketchHll>(&mut group, cardinality);
        bench_estimate::<HyperLogLogPlus>(&mut group, cardinality);
    }
    group.finish();

    let mut group = c.benchmark_group("merge");
    group.throughput(Throughput::Elements(1));
    for &cardinality in &cardinalities {
        bench_merge::<ZetasketchHll>(&mut group, cardinality);
        bench_merge::<HyperLogLogPlus>(&mut group, cardinality);
    }
    group.finish();

    let mut group = c.benchmark_group("serialize");
    group.throughput(Throughput::Elements(1));
    for &cardinality in &cardinalities {
        bench_serialize(&mut group, cardinality);
    }
    group.finish();

    let results: Vec<StatRecord> = cardinalities
        .iter()
        .map(|&cardinality| StatRecord {
            cardinality,
            zetasketch_hll: measure_allocations::<ZetasketchHll>(cardinality),
            hyperloglogplus: measure_allocations::<HyperLogLogPlus>(cardinality),
        })
        .collect();

    let table_config = Settings::default().with(Style::markdown());
    std::fs::write(
        format!("{}/memory_usage.md", bench_results_path),
        Table::new(results).with(table_config).to_string(),
    )
    .unwrap();

    let results: Vec<StatRecord> = cardinalities
        .iter()
        .map(|&cardinality| StatRecord {
            cardinality,
            zetasketch_hll: measure_error::<ZetasketchHll>(cardinality),
            hyperloglogplus: measure_error::<HyperLogLogPlus>(cardinality),
        })
        .collect();

    let table_config = Settings::default().with(Style::markdown());
    std::fs::write(
        format!("{}/relative_error.md", bench_results_path),
        Table::new(results).with(table_config).to_string(),
    )
    .unwrap();
}

/// Cardinality estimator trait representing common estimator operations.
trait CardinalityEstimatorTrait {
    fn new() -> Self;
    fn insert(&mut self, item: &u64);
    fn estimate(&mut self) -> u64;
    fn merge(&mut self, rhs: &Self);
    fn name() -> String;
}

fn filled<E: CardinalityEstimatorTrait>(offset: u64, cardinality: usize) -> E {
    let mut estimator = E::new();
    for i in 0..cardinality as u64 {
        estimator.insert(&(offset + i));
    }
    estimator
}

fn bench_insert<E: CardinalityEstimatorTrait>(
    group: &mut BenchmarkGroup<WallTime>,
    cardinality: usize,
) {
    group.bench_with_input(
        BenchmarkId::new(E::name(), cardinality),
        &cardinality,
        |b, &cardinality| {
            b.iter(|| {
                let mut estimator = E::new();
                for i in 0..black_box(cardinality) as u64 {
                    estimator.insert(black_box(&i));
                }
            });
        },
    );
}

fn bench_estimate<E: CardinalityEstimatorTrait>(
    group: &mut BenchmarkGroup<WallTime>,
    cardinality: usize,
) {
    group.bench_with_input(
        BenchmarkId::new(E::name(), cardinality),
        &cardinality,
        |b, &cardinality| {
            let mut estimator = filled::<E>(0, cardinality);
            b.iter(|| estimator.estimate());
        },
    );
}

fn bench_merge<E: CardinalityEstimatorTrait>(
    group: &mut BenchmarkGroup<WallTime>,
    cardinality: usize,
) {
    group.bench_with_input(
        BenchmarkId::new(E::name(), cardinality),
        &cardinality,
        |b, &cardinality| {
            let lhs = filled::<E>(0, cardinality);
            let rhs = filled::<E>(1 << 32, cardinality);
            b.iter_batched_ref(
                || filled::<E>(0, 0),
                |estimator| {
                    estimator.merge(&lhs);
                    estimator.merge(black_box(&rhs));
                },
                criterion::BatchSize::SmallInput,
            );
        },
    );
}

fn bench_serialize(group: &mut BenchmarkGroup<WallTime>, cardinality: usize) {
    group.bench_with_input(
        BenchmarkId::new(ZetasketchHll::name(), cardinality),
        &cardinality,
        |b, &cardinality| {
            let estimator = filled::<ZetasketchHll>(0, cardinality);
            b.iter(|| {
                let bytes = estimator.0.to_bytes().unwrap();
                HyperLogLogPlusPlus::from_bytes(black_box(&bytes)).unwrap()
            });
        },
    );
}

fn measure_allocations<E: CardinalityEstimatorTrait>(cardinality: usize) -> String {
    let _profiler = dhat::Profiler::builder().testing().build();
    let estimator = filled::<E>(0, cardinality);
    let stats = dhat::HeapStats::get();
    drop(estimator);
    format!(
        "{} / {} / {}",
        std::mem::size_of::<E>(),
        stats.total_bytes,
        stats.total_blocks,
    )
}

fn measure_error<E: CardinalityEstimatorTrait>(cardinality: usize) -> String {
    let n = 100;
    let mut total_relative_error: f64 = 0.0;
    let mut rng = StdRng::seed_from_u64(12345);
    for _ in 0..n {
        let mut estimator = E::new();
        for _ in 0..cardinality {
            estimator.insert(&rng.gen());
        }
        let relative_error = if cardinality == 0 {
            0.0
        } else {
            (estimator.estimate() as f64 - cardinality as f64).abs() / cardinality as f64
        };
        total_relative_error += relative_error;
    }
    let avg_relative_error = total_relative_error / f64::from(n);

    if avg_relative_error < 1.0 {
        format!("{:.4}", avg_relative_error)
    } else {
        format!("{:.2e}", avg_relative_error)
    }
}

#[derive(Tabled)]
struct StatRecord {
    cardinality: usize,
    zetasketch_hll: String,
    hyperloglogplus: String,
}

struct ZetasketchHll(HyperLogLogPlusPlus);

impl CardinalityEstimatorTrait for ZetasketchHll {
    fn new() -> Self {
        Self(HllConfig::default().build().unwrap())
    }

    fn insert(&mut self, item: &u64) {
        self.0.insert(item).unwrap();
    }

    fn estimate(&mut self) -> u64 {
        self.0.estimate()
    }

    fn merge(&mut self, rhs: &Self) {
        self.0.merge(&rhs.0);
    }

    fn name() -> String {
        "zetasketch-hll".to_string()
    }
}

struct HyperLogLogPlus(hyperloglogplus::HyperLogLogPlus<u64, BuildHasherDefault<WyHash>>);

impl CardinalityEstimatorTrait for HyperLogLogPlus {
    fn new() -> Self {
        Self(
            hyperloglogplus::HyperLogLogPlus::new(15, BuildHasherDefault::<WyHash>::default())
                .unwrap(),
        )
    }

    fn insert(&mut self, item: &u64) {
        self.0.insert(item);
    }

    fn estimate(&mut self) -> u64 {
        self.0.count() as u64
    }

    fn merge(&mut self, rhs: &Self) {
        self.0.merge(&rhs.0).unwrap();
    }

    fn name() -> String {
        "hyperloglogplus".to_string()
    }
}
