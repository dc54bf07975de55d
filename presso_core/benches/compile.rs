use criterion::{Criterion, black_box, criterion_group, criterion_main};
use presso_core::{ActuatorConstants, Profile, ProfilePoint, compile};

// One point per second with a slow sine around 6 bar
fn long_profile(n: usize) -> Profile {
    let points = (0..n)
        .map(|i| {
            let t = i as f64;
            ProfilePoint::new(t, 6.0 + 3.0 * (t / 10.0).sin())
        })
        .collect();
    Profile::from_points(points).unwrap_or_default()
}

pub fn bench_compile(c: &mut Criterion) {
    let k = ActuatorConstants::default();
    let classic = Profile::classic();
    c.bench_function("compile_classic", |b| {
        b.iter(|| compile(black_box(&classic), black_box(&k)));
    });
    let long = long_profile(600);
    c.bench_function("compile_600_points", |b| {
        b.iter(|| compile(black_box(&long), black_box(&k)));
    });
    let seq = compile(&classic, &k);
    c.bench_function("encode_classic_wire", |b| {
        b.iter(|| black_box(&seq).to_wire());
    });
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
