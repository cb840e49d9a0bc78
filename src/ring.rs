// Copyright (c) 2019 Andreas Auernhammer. All rights reserved.
// Use of this source code is governed by a license that can be
// found in the LICENSE file.

//! AEAD algorithms backed by [*ring*](https://github.com/briansmith/ring).

use crate::aead::Algorithm;
use crate::error::{Invalid, NotAuthentic};
use ring::aead;

#[allow(non_camel_case_types)]
pub struct AES_128_GCM {
    key: aead::LessSafeKey,
}

impl Algorithm for AES_128_GCM {
    const KEY_LEN: usize = 128 / 8;
    const NONCE_LEN: usize = 96 / 8;
    const TAG_LEN: usize = 128 / 8;

    fn new(key: &[u8]) -> Result<Self, Invalid> {
        Ok(Self {
            key: less_safe_key(&aead::AES_128_GCM, key)?,
        })
    }

    fn seal_in_place<'a>(
        &self,
        nonce: &[u8],
        aad: &[u8],
        in_out: &'a mut [u8],
    ) -> Result<&'a [u8], Invalid> {
        seal_in_place(&self.key, nonce, aad, in_out, Self::TAG_LEN)
    }

    fn open_in_place<'a>(
        &self,
        nonce: &[u8],
        aad: &[u8],
        in_out: &'a mut [u8],
    ) -> Result<&'a [u8], NotAuthentic> {
        open_in_place(&self.key, nonce, aad, in_out)
    }
}

#[allow(non_camel_case_types)]
pub struct AES_256_GCM {
    key: aead::LessSafeKey,
}

impl Algorithm for AES_256_GCM {
    const KEY_LEN: usize = 256 / 8;
    const NONCE_LEN: usize = 96 / 8;
    const TAG_LEN: usize = 128 / 8;

    fn new(key: &[u8]) -> Result<Self, Invalid> {
        Ok(Self {
            key: less_safe_key(&aead::AES_256_GCM, key)?,
        })
    }

    fn seal_in_place<'a>(
        &self,
        nonce: &[u8],
        aad: &[u8],
        in_out: &'a mut [u8],
    ) -> Result<&'a [u8], Invalid> {
        seal_in_place(&self.key, nonce, aad, in_out, Self::TAG_LEN)
    }

    fn open_in_place<'a>(
        &self,
        nonce: &[u8],
        aad: &[u8],
        in_out: &'a mut [u8],
    ) -> Result<&'a [u8], NotAuthentic> {
        open_in_place(&self.key, nonce, aad, in_out)
    }
}

#[allow(non_camel_case_types)]
pub struct CHACHA20_POLY1305 {
    key: aead::LessSafeKey,
}

impl Algorithm for CHACHA20_POLY1305 {
    const KEY_LEN: usize = 256 / 8;
    const NONCE_LEN: usize = 96 / 8;
    const TAG_LEN: usize = 128 / 8;

    fn new(key: &[u8]) -> Result<Self, Invalid> {
        Ok(Self {
            key: less_safe_key(&aead::CHACHA20_POLY1305, key)?,
        })
    }

    fn seal_in_place<'a>(
        &self,
        nonce: &[u8],
        aad: &[u8],
        in_out: &'a mut [u8],
    ) -> Result<&'a [u8], Invalid> {
        seal_in_place(&self.key, nonce, aad, in_out, Self::TAG_LEN)
    }

    fn open_in_place<'a>(
        &self,
        nonce: &[u8],
        aad: &[u8],
        in_out: &'a mut [u8],
    ) -> Result<&'a [u8], NotAuthentic> {
        open_in_place(&self.key, nonce, aad, in_out)
    }
}

fn less_safe_key(algorithm: &'static aead::Algorithm, key: &[u8]) -> Result<aead::LessSafeKey, Invalid> {
    let key = aead::UnboundKey::new(algorithm, key).map_err(|_| Invalid::Key)?;
    Ok(aead::LessSafeKey::new(key))
}

fn seal_in_place<'a>(
    key: &aead::LessSafeKey,
    nonce: &[u8],
    aad: &[u8],
    in_out: &'a mut [u8],
    tag_len: usize,
) -> Result<&'a [u8], Invalid> {
    let nonce = aead::Nonce::try_assume_unique_for_key(nonce).map_err(|_| Invalid::Nonce)?;
    let tag_at = in_out.len() - tag_len;
    let tag = key
        .seal_in_place_separate_tag(nonce, aead::Aad::from(aad), &mut in_out[..tag_at])
        .map_err(|_| Invalid::BufSize)?;
    in_out[tag_at..].copy_from_slice(tag.as_ref());
    Ok(in_out)
}

fn open_in_place<'a>(
    key: &aead::LessSafeKey,
    nonce: &[u8],
    aad: &[u8],
    in_out: &'a mut [u8],
) -> Result<&'a [u8], NotAuthentic> {
    let nonce = aead::Nonce::try_assume_unique_for_key(nonce).map_err(|_| NotAuthentic)?;
    key.open_in_place(nonce, aead::Aad::from(aad), in_out)
        .map(|plaintext| &*plaintext)
        .map_err(|_| NotAuthentic)
}
