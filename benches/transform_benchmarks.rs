use criterion::{
    Criterion, //
    criterion_group,
    criterion_main,
};
use duplex_expand::{
    Layout, MappedOutput, NoProbe, Strategy, TransformConfig, count_markers, run_forked,
    run_threads, transform, transform_file,
};
use std::hint::black_box;

fn sample_text(repeat: usize) -> Vec<u8> {
    b"The 3 quick brown foxes jumped over 12 lazy dogs, 0 times at 9:45.\n".repeat(repeat)
}

fn benchmark_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");

    let small = sample_text(1);
    let large = sample_text(16 * 1024);

    group.bench_function("scan_small", |b| {
        b.iter(|| Layout::scan(black_box(&small)))
    });

    group.bench_function("scan_1mb", |b| {
        b.iter(|| Layout::scan(black_box(&large)))
    });

    group.bench_function("count_markers_1mb", |b| {
        let out = transform(&large, &TransformConfig::default()).unwrap();
        b.iter(|| count_markers(black_box(&out), b'*'))
    });

    group.finish();
}

fn benchmark_threads(c: &mut Criterion) {
    let mut group = c.benchmark_group("threads");

    let small = sample_text(1);
    let large = sample_text(16 * 1024);

    group.bench_function("run_threads_small", |b| {
        let layout = Layout::scan(&small).unwrap();
        let mut buf = vec![0u8; layout.output_len];
        b.iter(|| run_threads(black_box(&small), &mut buf, b'*', &NoProbe))
    });

    group.bench_function("run_threads_1mb", |b| {
        let layout = Layout::scan(&large).unwrap();
        let mut buf = vec![0u8; layout.output_len];
        b.iter(|| run_threads(black_box(&large), &mut buf, b'*', &NoProbe))
    });

    group.finish();
}

fn benchmark_processes(c: &mut Criterion) {
    let mut group = c.benchmark_group("processes");
    group.sample_size(20);

    let large = sample_text(16 * 1024);
    let dir = tempfile::tempdir().unwrap();

    group.bench_function("run_forked_1mb", |b| {
        let layout = Layout::scan(&large).unwrap();
        let mut out = MappedOutput::create(dir.path().join("forked.out"), layout.output_len).unwrap();
        b.iter(|| run_forked(black_box(&large), &mut out, b'*'))
    });

    group.bench_function("transform_file_1mb", |b| {
        let input = dir.path().join("in.txt");
        std::fs::write(&input, &large).unwrap();
        let output = dir.path().join("out.txt");
        let config = TransformConfig::default()
            .with_strategy(Strategy::Processes)
            .with_sync(false);
        b.iter(|| transform_file(&input, &output, &config))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_layout,
    benchmark_threads,
    benchmark_processes
);
criterion_main!(benches);
