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
fn encrypt_read(bencher: Bencher, size: usize) {
    let stream = new_stream();
    let data = vec![0u8; size];

    bencher.counter(BytesCount::new(size)).bench_local(|| {
        let mut reader = stream.encrypt_reader(black_box(data.as_slice()), &[0; 8], &[]);
        io::copy(&mut reader, &mut io::sink()).unwrap();
    });
}

#[divan::bench(args = [1024, 64 * 1024, 512 * 1024, 1024 * 1024])]
fn decrypt_read(bencher: Bencher, size: usize) {
    let stream = new_stream();
    let data = vec![0u8; size];
    let mut ciphertext = Vec::new();
    {
        let mut writer = stream.encrypt_writer(&mut ciphertext, &[0; 8], &[]);
        writer.write_all(&data).unwrap();
        writer.close().unwrap();
    }

    bencher.counter(BytesCount::new(size)).bench_local(|| {
        let mut reader = stream.decrypt_reader(black_box(ciphertext.as_slice()), &[0; 8], &[]);
        io::copy(&mut reader, &mut io::sink()).unwrap();
    });
}

#[divan::bench(args = [1024, 64 * 1024, 512 * 1024, 1024 * 1024])]
fn decrypt_read_at(bencher: Bencher, size: usize) {
    let stream = new_stream();
    let data = vec![0u8; size];
    let mut ciphertext = Vec::new();
    {
        let mut writer = stream.encrypt_writer(&mut ciphertext, &[0; 8], &[]);
        writer.write_all(&data).unwrap();
        writer.close().unwrap();
    }
    let reader = stream.decrypt_reader_at(ciphertext, &[0; 8], &[]);
    let mut buf = vec![0u8; size];

    bencher.counter(BytesCount::new(size)).bench_local(move || {
        reader.read_at(black_box(&mut buf), 0).unwrap();
    });
}
