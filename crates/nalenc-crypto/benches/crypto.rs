use nalenc_crypto::{generate_key, CipherEngine, StreamControl};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt(bencher: divan::Bencher, size: usize) {
    let key = generate_key().unwrap();
    let engine = CipherEngine::default();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            let mut out = Vec::with_capacity(size + 1024);
            engine
                .encrypt(
                    divan::black_box(&key),
                    divan::black_box(&data[..]),
                    &mut out,
                    &StreamControl::default(),
                )
                .unwrap();
            out
        });
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt(bencher: divan::Bencher, size: usize) {
    let key = generate_key().unwrap();
    let engine = CipherEngine::default();
    let data = make_data(size);
    let mut container = Vec::new();
    engine
        .encrypt(&key, &data[..], &mut container, &StreamControl::default())
        .unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            let mut out = Vec::with_capacity(size);
            engine
                .decrypt(
                    divan::black_box(&key),
                    divan::black_box(&container[..]),
                    &mut out,
                    &StreamControl::default(),
                )
                .unwrap();
            out
        });
}

fn main() {
    divan::main();
}
