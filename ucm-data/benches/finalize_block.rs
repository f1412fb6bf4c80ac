use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ucm_core::{Trial, TrialLayout};
use ucm_data::{content_hash, finalize_trials};

fn block(n: usize) -> Vec<Trial> {
    (0..n)
        .map(|i| {
            let x = i as f64 / n as f64;
            Trial {
                index: i,
                df1_value: x,
                df2_value: 1.0 - x,
                df1_grab_dt: 0.2 + x,
                df1_release_dt: 2.5,
                df2_grab_dt: 0.4,
                df2_release_dt: 2.9 - x,
            }
        })
        .collect()
}

pub fn bench_finalize(c: &mut Criterion) {
    let mut g = c.benchmark_group("finalize_block");
    for n in [20usize, 200] {
        let trials = block(n);
        g.bench_function(format!("full_{n}"), |b| {
            b.iter(|| {
                let table = finalize_trials(black_box(&trials), TrialLayout::Full);
                black_box(content_hash(&table.rows))
            })
        });
    }
    g.bench_function("csv_200", |b| {
        let table = finalize_trials(&block(200), TrialLayout::Full);
        b.iter(|| black_box(table.to_csv()))
    });
    g.finish();
}

criterion_group!(benches, bench_finalize);
criterion_main!(benches);
