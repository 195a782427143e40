//! Benchmarks for kernel evaluation, prediction and training.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use svmlearn::{DataFile, Kernel, Machine, SparseVector, Trainer};

fn fixture(name: &str) -> String {
    format!("{}/tests/data/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn bench_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_evaluate");
    let x = SparseVector::from_dense(&(0..64).map(|i| (i as f64).sin()).collect::<Vec<_>>());
    let y = SparseVector::from_dense(&(0..64).map(|i| (i as f64).cos()).collect::<Vec<_>>());

    let kernels = [
        Kernel::Linear,
        Kernel::Rbf { gamma: 0.1 },
        Kernel::Polynomial {
            degree: 3,
            gamma: 0.1,
            coef0: 1.0,
        },
        Kernel::Sigmoid {
            gamma: 0.1,
            coef0: 0.0,
        },
    ];
    for kernel in kernels {
        group.bench_with_input(BenchmarkId::from_parameter(kernel.name()), &kernel, |b, k| {
            b.iter(|| k.evaluate(black_box(&x), black_box(&y)))
        });
    }
    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let machine = Machine::load(fixture("heart_like.svmmodel")).unwrap();
    let (_, rows) = DataFile::open(fixture("heart_sample.data"))
        .unwrap()
        .read_all()
        .unwrap();

    c.bench_function("predict_classes", |b| {
        b.iter(|| machine.predict_classes(black_box(&rows)).unwrap())
    });
    c.bench_function("predict_classes_and_probabilities", |b| {
        b.iter(|| {
            machine
                .predict_classes_and_probabilities(black_box(&rows))
                .unwrap()
        })
    });
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("train_two_class");
    group.sample_size(10);

    for size in [20, 100, 400].iter() {
        let positives: Vec<Vec<f64>> = (0..*size)
            .map(|i| vec![1.0 + (i as f64 * 0.37).sin(), 1.0 + (i as f64 * 0.53).cos()])
            .collect();
        let negatives: Vec<Vec<f64>> = (0..*size)
            .map(|i| vec![-1.0 + (i as f64 * 0.41).sin(), -1.0 + (i as f64 * 0.29).cos()])
            .collect();
        let data = vec![positives, negatives];

        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| Trainer::new().train(black_box(data)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_kernels, bench_prediction, bench_training);
criterion_main!(benches);
