use criterion::{Criterion, black_box, criterion_group, criterion_main};
use exchange_core::config::GainCfg;
use exchange_core::{ChannelLayout, GainEnvelope, GainTargets};

// Noisy tone: sine plus xorshift noise, 16-bit
fn synth_buffer(n: usize, seed: u32) -> Vec<i16> {
    let mut state = seed.max(1);
    let mut noise = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x as f32) / (u32::MAX as f32 + 1.0) * 2.0 - 1.0
    };
    (0..n)
        .map(|i| {
            let s = (i as f32 / 20.0).sin() * 12_000.0 + noise() * 500.0;
            s as i16
        })
        .collect()
}

pub fn bench_gain(c: &mut Criterion) {
    let mut g = c.benchmark_group("gain_envelope");
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p exchange_core --bench gain
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    let cfg = GainCfg::default();
    let mono = synth_buffer(1152, 0xC0FFEE);
    let stereo = synth_buffer(2304, 0xBEEF);

    for (name, input, layout) in [
        ("mono_1152", &mono, ChannelLayout::Mono),
        ("stereo_1152", &stereo, ChannelLayout::Stereo),
    ] {
        g.bench_function(name, |b| {
            let targets = GainTargets::new(0.5, 0.0);
            targets.set_gate_enabled(true);
            let mut env = GainEnvelope::new(targets, &cfg);
            let mut out = Vec::with_capacity(input.len() * 2);
            b.iter(|| {
                out.clear();
                env.process(black_box(input), layout, 44_100, &mut out);
                black_box(out.len())
            })
        });
    }
    g.finish();
}

criterion_group!(gain, bench_gain);
criterion_main!(gain);
