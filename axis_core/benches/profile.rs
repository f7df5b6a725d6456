use axis_core::links::extract_links;
use axis_core::util::count_unique;
use axis_core::{MotionLimits, compute_profile};
use axis_config::{ArrayInfo, SymbolEntry};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

// Synthetic position trace: a ramp sampled by a coarse encoder, so many
// consecutive samples repeat.
fn synth_trace(n: usize, target: f64, resolution: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = target * i as f64 / n as f64;
            (x / resolution).round() * resolution
        })
        .collect()
}

fn synth_symbols(n: usize) -> Vec<SymbolEntry> {
    (0..n)
        .map(|i| SymbolEntry {
            name: format!("Main.Stage{i}"),
            base_type: "ST_MotionStage".into(),
            pragmas: [("axis-link".to_string(), format!("GVL.Axes[$INDEX$].Nc{i}"))]
                .into_iter()
                .collect(),
            array: Some(ArrayInfo {
                lbound: 1,
                elements: 8,
            }),
        })
        .collect()
}

pub fn bench_harness_math(c: &mut Criterion) {
    let mut g = c.benchmark_group("harness_math");
    // Quick runs without CLI flags (Criterion 0.5):
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p axis_core --bench profile
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE")
        && let Ok(n) = ss.parse::<usize>()
    {
        g.sample_size(n.max(1));
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    let limits = MotionLimits::default();
    g.bench_function("compute_profile", |b| {
        b.iter(|| {
            for offset in [-500.0, -9.0, 0.5, 20.0, 4000.0] {
                black_box(compute_profile(
                    black_box(12.5),
                    black_box(offset),
                    black_box(2.5),
                    &limits,
                ));
            }
        });
    });

    let trace = synth_trace(20_000, 250.0, 0.01);
    g.bench_function("count_unique_trace", |b| {
        b.iter_batched(
            || trace.clone(),
            |t| black_box(count_unique(black_box(&t))),
            BatchSize::SmallInput,
        );
    });

    let symbols = synth_symbols(500);
    g.bench_function("extract_links", |b| {
        b.iter(|| black_box(extract_links(black_box(&symbols))));
    });
    g.finish();
}

criterion_group!(profile, bench_harness_math);
criterion_main!(profile);
