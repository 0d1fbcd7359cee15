//! Extraction benchmark: keystroke events → timing feature vector.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use keystroke_auth::events::KeystrokeEvent;
use keystroke_auth::features::TimingExtractor;

fn make_typing(n_keys: usize) -> Vec<KeystrokeEvent> {
    (0..n_keys)
        .flat_map(|i| {
            let key = ((b'a' + (i % 26) as u8) as char).to_string();
            let t = (i as i64) * 140;
            [KeystrokeEvent::down(key.clone(), t), KeystrokeEvent::up(key, t + 90 + (i as i64 % 30))]
        })
        .collect()
}

fn bench_extract(c: &mut Criterion) {
    let extractor = TimingExtractor::default();
    let mut g = c.benchmark_group("extract_by_keys");
    for n in [8, 32, 128, 500] {
        let events = make_typing(n);
        g.bench_function(format!("keys_{}", n).as_str(), |b| {
            b.iter(|| extractor.extract(black_box(&events)))
        });
    }
    g.finish();
}

criterion_group!(benches, bench_extract);
criterion_main!(benches);
