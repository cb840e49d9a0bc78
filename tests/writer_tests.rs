// Copyright (c) 2019 Andreas Auernhammer. All rights reserved.
// Use of this source code is governed by a license that can be
// found in the LICENSE file.

#![cfg(feature = "ring")]

use rand::RngCore;
use sealstream::*;
use std::io;
use std::io::Write;

type AEAD = ring::AES_256_GCM;

fn new_stream(buf_size: usize) -> Stream<AEAD> {
    Stream::new(AEAD::new(&[0; AEAD::KEY_LEN]).unwrap(), buf_size)
}

fn random(len: usize) -> Vec<u8> {
    let mut data = vec![0; len];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

fn encrypt(stream: &Stream<AEAD>, plaintext: &[u8], aad: &[u8]) -> Vec<u8> {
    let mut ciphertext = Vec::new();
    {
        let mut writer = stream.encrypt_writer(&mut ciphertext, &[0; 8], aad);
        writer.write_all(plaintext).unwrap();
        writer.close().unwrap();
    }
    ciphertext
}

fn decrypt(stream: &Stream<AEAD>, ciphertext: &[u8], aad: &[u8]) -> io::Result<Vec<u8>> {
    let mut plaintext = Vec::new();
    {
        let mut writer = stream.decrypt_writer(&mut plaintext, &[0; 8], aad);
        writer.write_all(ciphertext).and_then(|()| writer.close())?;
    }
    Ok(plaintext)
}

#[test]
fn write() -> io::Result<()> {
    let stream = new_stream(BUF_SIZE);
    let data = random(1 << 20);

    let mut ciphertext = Vec::with_capacity(data.len());
    {
        let mut writer = stream.encrypt_writer(&mut ciphertext, &[0; 8], &[]);
        let half = data.len() / 2;
        writer
            .write_all(&data[..half])
            .and_then(|()| writer.write_all(&data[half..]))
            .and_then(|()| writer.close())?;
    }

    let mut plaintext = Vec::with_capacity(data.len());
    {
        let mut writer = stream.decrypt_writer(&mut plaintext, &[0; 8], &[]);
        let half = ciphertext.len() / 2;
        writer
            .write_all(&ciphertext[..half])
            .and_then(|()| writer.write_all(&ciphertext[half..]))
            .and_then(|()| writer.close())?;
    }

    assert_eq!(data, plaintext);
    Ok(())
}

#[test]
fn write_empty() -> io::Result<()> {
    let stream = new_stream(BUF_SIZE);

    let mut ciphertext = Vec::new();
    stream
        .encrypt_writer(&mut ciphertext, &[0; 8], &[])
        .close()
        .expect("The encryption failed");

    assert_eq!(ciphertext.len(), AEAD::TAG_LEN);
    assert_eq!(decrypt(&stream, &ciphertext, &[])?, Vec::<u8>::new());
    Ok(())
}

#[test]
fn write_byte() -> io::Result<()> {
    let stream = new_stream(29);
    let data = random(1000);

    let mut ciphertext = Vec::new();
    {
        let mut writer = stream.encrypt_writer(&mut ciphertext, &[0; 8], &[]);
        for &b in data.iter() {
            writer.write_byte(b)?;
        }
        writer.close()?;
    }

    let mut plaintext = Vec::new();
    {
        let mut writer = stream.decrypt_writer(&mut plaintext, &[0; 8], &[]);
        for &b in ciphertext.iter() {
            writer.write_byte(b)?;
        }
        writer.close()?;
    }

    assert_eq!(data, plaintext);
    Ok(())
}

#[test]
fn close_nested_writers() -> io::Result<()> {
    let stream = new_stream(BUF_SIZE);
    let data = random(1 << 20);

    let mut plaintext = Vec::with_capacity(data.len());
    {
        let mut writer = stream.encrypt_writer(
            io::BufWriter::new(stream.decrypt_writer(&mut plaintext, &[0; 8], &[])),
            &[0; 8],
            &[],
        );
        writer.write_all(&data).and_then(|()| writer.close())?;
    }

    assert_eq!(data, plaintext);
    Ok(())
}

#[test]
fn read_from() -> io::Result<()> {
    for &len in &[0usize, 1, 28, 29, 30, 59, 1000] {
        let stream = new_stream(29);
        let data = random(len);

        let mut ciphertext = Vec::new();
        {
            let mut writer = stream.encrypt_writer(&mut ciphertext, &[0; 8], &[]);
            let n = writer.read_from(&mut &data[..])?;
            assert_eq!(n, len as u64);
            assert!(writer.is_closed());
        }
        assert_eq!(ciphertext, encrypt(&stream, &data, &[]));

        let mut plaintext = Vec::new();
        {
            let mut writer = stream.decrypt_writer(&mut plaintext, &[0; 8], &[]);
            let n = writer.read_from(&mut &ciphertext[..])?;
            assert_eq!(n, ciphertext.len() as u64);
            assert!(writer.is_closed());
        }
        assert_eq!(data, plaintext);
    }
    Ok(())
}

#[test]
fn overhead_matches_ciphertext_length() {
    for &buf_size in &[1usize, 29, BUF_SIZE] {
        let stream = new_stream(buf_size);
        for &len in &[0usize, 1, buf_size - 1, buf_size, buf_size + 1, 2 * buf_size] {
            let data = random(len);
            let ciphertext = encrypt(&stream, &data, &[]);
            assert_eq!(
                (ciphertext.len() - len) as u64,
                stream.overhead(len as u64),
                "buf_size: {} len: {}",
                buf_size,
                len,
            );
        }
    }
}

#[test]
fn not_authentic_on_bit_flip() {
    let stream = new_stream(29);
    let data = random(100);
    let ciphertext = encrypt(&stream, &data, &[]);

    for i in 0..ciphertext.len() {
        let mut corrupted = ciphertext.clone();
        corrupted[i] ^= 0x01;
        let err = decrypt(&stream, &corrupted, &[]).unwrap_err();
        assert!(
            err.get_ref().unwrap().is::<NotAuthentic>(),
            "bit flip at {} was not detected",
            i,
        );
    }
}

#[test]
fn not_authentic_on_truncation() {
    let stream = new_stream(29);
    let data = random(100); // 3 full fragments + 13 final bytes
    let ciphertext = encrypt(&stream, &data, &[]);

    for len in 0..ciphertext.len() {
        let err = decrypt(&stream, &ciphertext[..len], &[]).unwrap_err();
        assert!(
            err.get_ref().unwrap().is::<NotAuthentic>(),
            "truncation to {} bytes was not detected",
            len,
        );
    }
}

#[test]
fn not_authentic_on_fragment_boundary_truncation() {
    let stream = new_stream(29);
    let data = random(4 * 29);
    let ciphertext = encrypt(&stream, &data, &[]);

    // A prefix that ends exactly on an intermediate-fragment boundary:
    // the decoder opens the last buffered fragment as final and must
    // reject it.
    let boundary = 2 * (29 + AEAD::TAG_LEN);
    let err = decrypt(&stream, &ciphertext[..boundary], &[]).unwrap_err();
    assert!(err.get_ref().unwrap().is::<NotAuthentic>());
}

#[test]
fn not_authentic_on_concatenation() {
    let stream = new_stream(29);
    let ciphertext = encrypt(&stream, &random(70), &[]);

    let mut concatenated = ciphertext.clone();
    concatenated.extend_from_slice(&ciphertext);
    let err = decrypt(&stream, &concatenated, &[]).unwrap_err();
    assert!(err.get_ref().unwrap().is::<NotAuthentic>());
}

#[test]
fn not_authentic_on_wrong_aad() {
    let stream = new_stream(BUF_SIZE);
    let ciphertext = encrypt(&stream, &random(100), b"right aad");

    let err = decrypt(&stream, &ciphertext, b"wrong aad").unwrap_err();
    assert!(err.get_ref().unwrap().is::<NotAuthentic>());
    assert_eq!(
        decrypt(&stream, &ciphertext, b"right aad").unwrap().len(),
        100
    );
}

#[test]
fn error_is_latched() {
    let stream = new_stream(29);
    let data = random(100);
    let mut ciphertext = encrypt(&stream, &data, &[]);
    ciphertext[3] ^= 0x80;

    let mut writer = stream.decrypt_writer(io::sink(), &[0; 8], &[]);
    let err = writer.write(&ciphertext).unwrap_err();
    assert!(err.get_ref().unwrap().is::<NotAuthentic>());

    // Every further operation replays the first error, including close.
    let err = writer.write(&[0]).unwrap_err();
    assert!(err.get_ref().unwrap().is::<NotAuthentic>());
    let err = writer.close().unwrap_err();
    assert!(err.get_ref().unwrap().is::<NotAuthentic>());
}
