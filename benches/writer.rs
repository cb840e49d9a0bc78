use divan::counter::BytesCount;
use divan::{black_box, Bencher};
use sealstream::ring::AES_256_GCM;
use sealstream::{Algorithm, Stream, BUF_SIZE};
use std::io;
use std::io::Write;

fn main() {
    divan::main();
}

fn new_stream() -> Stream<AES_256_GCM> {
    Stream::new(AES_256_GCM::new(&[0; AES_256_GCM::KEY_LEN]).unwrap(), BUF_SIZE)
}

#[divan::bench(args = [1024, 64 * 1024, 512 * 1024, 1024 * 1024])]
fn encrypt_write(bencher: Bencher, size: usize) {
    let stream = new_stream();
    let data = vec![0u8; size];

    bencher.counter(BytesCount::new(size)).bench_local(|| {
        let mut writer = stream.encrypt_writer(io::sink(), &[0; 8], &[]);
        writer.write_all(black_box(&data)).unwrap();
        writer.close().unwrap();
    });
}

#[divan::bench(args = [1024, 64 * 1024, 512 * 1024, 1024 * 1024])]
fn decrypt_write(bencher: Bencher, size: usize) {
    let stream = new_stream();
    let data = vec![0u8; size];
    let mut ciphertext = Vec::new();
    {
        let mut writer = stream.encrypt_writer(&mut ciphertext, &[0; 8], &[]);
        writer.write_all(&data).unwrap();
        writer.close().unwrap();
    }

    bencher.counter(BytesCount::new(size)).bench_local(|| {
        let mut writer = stream.decrypt_writer(io::sink(), &[0; 8], &[]);
        writer.write_all(black_box(&ciphertext)).unwrap();
        writer.close().unwrap();
    });
}
