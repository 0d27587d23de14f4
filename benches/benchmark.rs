use criterion::{black_box, criterion_group, criterion_main, Criterion};
use icvadjust::{adjust_volumes, affine_determinant, fit_ols, AntsAffine, IcvTable, StudyConfig, VolumeTable};
use ndarray::Array1;

fn demo_affine_bytes() -> Vec<u8> {
    let affine = AntsAffine {
        parameters: vec![1.02, 0.01, -0.03, 0.02, 0.97, 0.01, -0.01, 0.04, 1.05, -1.5, 3.2, 0.7],
        fixed: vec![0.5, -12.0, 8.25],
    };
    let mut bytes = Vec::new();
    affine.to_writer(&mut bytes).unwrap();
    bytes
}

/// A cohort of 200 subjects with 40 regions and 4 timepoints.
fn demo_cohort() -> (IcvTable, VolumeTable) {
    let mut icv = IcvTable::new();
    let mut volumes = VolumeTable::new();
    for s in 0..200 {
        let subject = format!("{:07}", 2000000 + s);
        let value = 0.9 + (s % 37) as f64 * 0.01;
        icv.insert(subject.clone(), Some(value));
        for r in 0..40 {
            let region = format!("Region_{}", r);
            for t in 0..4 {
                let raw = 1000.0 * value + (r * 13 + s % 11) as f64 - t as f64 * 2.5;
                volumes.insert(&subject, t, &region, Some(raw));
            }
        }
    }
    (icv, volumes)
}

fn bench_determinant(c: &mut Criterion) {
    let bytes = demo_affine_bytes();
    c.bench_function("ants_affine_from_bytes", |b| {
        b.iter(|| AntsAffine::from_bytes(black_box(&bytes)).unwrap())
    });
    let parameters = AntsAffine::from_bytes(&bytes).unwrap().parameters;
    c.bench_function("affine_determinant", |b| {
        b.iter(|| affine_determinant(black_box(&parameters)).unwrap())
    });
}

fn bench_adjustment(c: &mut Criterion) {
    let x: Array1<f64> = (0..1000).map(|i| 0.9 + (i % 97) as f64 * 0.003).collect();
    let y: Array1<f64> = x.iter().enumerate().map(|(i, v)| 800.0 * v + (i % 7) as f64).collect();
    c.bench_function("fit_ols", |b| b.iter(|| fit_ols(black_box(&x), black_box(&y)).unwrap()));

    let (icv, volumes) = demo_cohort();
    let config = StudyConfig::default();
    c.bench_function("adjust_volumes", |b| {
        b.iter(|| adjust_volumes(black_box(&icv), black_box(&volumes), &config, 3))
    });
}

criterion_group!(benches, bench_determinant, bench_adjustment);
criterion_main!(benches);
