// Copyright (c) 2019 Andreas Auernhammer. All rights reserved.
// Use of this source code is governed by a license that can be
// found in the LICENSE file.

//! AEAD algorithms backed by the pure-Rust
//! [`chacha20poly1305`](https://docs.rs/chacha20poly1305) crate.
//!
//! The XChaCha20-Poly1305 variant uses a 24 byte nonce, which leaves a
//! 20 byte random prefix after the stream construction takes its four
//! counter bytes.

use crate::aead::Algorithm;
use crate::error::{Invalid, NotAuthentic};
use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce, Tag, XChaCha20Poly1305, XNonce};

#[allow(non_camel_case_types)]
pub struct CHACHA20_POLY1305 {
    cipher: ChaCha20Poly1305,
}

impl Algorithm for CHACHA20_POLY1305 {
    const KEY_LEN: usize = 256 / 8;
    const NONCE_LEN: usize = 96 / 8;
    const TAG_LEN: usize = 128 / 8;

    fn new(key: &[u8]) -> Result<Self, Invalid> {
        if key.len() != Self::KEY_LEN {
            return Err(Invalid::Key);
        }
        Ok(Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        })
    }

    fn seal_in_place<'a>(
        &self,
        nonce: &[u8],
        aad: &[u8],
        in_out: &'a mut [u8],
    ) -> Result<&'a [u8], Invalid> {
        if nonce.len() != Self::NONCE_LEN {
            return Err(Invalid::Nonce);
        }
        let tag_at = in_out.len() - Self::TAG_LEN;
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::from_slice(nonce), aad, &mut in_out[..tag_at])
            .map_err(|_| Invalid::BufSize)?;
        in_out[tag_at..].copy_from_slice(tag.as_slice());
        Ok(in_out)
    }

    fn open_in_place<'a>(
        &self,
        nonce: &[u8],
        aad: &[u8],
        in_out: &'a mut [u8],
    ) -> Result<&'a [u8], NotAuthentic> {
        if nonce.len() != Self::NONCE_LEN || in_out.len() < Self::TAG_LEN {
            return Err(NotAuthentic);
        }
        let tag_at = in_out.len() - Self::TAG_LEN;
        let (msg, tag) = in_out.split_at_mut(tag_at);
        self.cipher
            .decrypt_in_place_detached(Nonce::from_slice(nonce), aad, msg, Tag::from_slice(tag))
            .map_err(|_| NotAuthentic)?;
        Ok(&in_out[..tag_at])
    }
}

#[allow(non_camel_case_types)]
pub struct XCHACHA20_POLY1305 {
    cipher: XChaCha20Poly1305,
}

impl Algorithm for XCHACHA20_POLY1305 {
    const KEY_LEN: usize = 256 / 8;
    const NONCE_LEN: usize = 192 / 8;
    const TAG_LEN: usize = 128 / 8;

    fn new(key: &[u8]) -> Result<Self, Invalid> {
        if key.len() != Self::KEY_LEN {
            return Err(Invalid::Key);
        }
        Ok(Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(key)),
        })
    }

    fn seal_in_place<'a>(
        &self,
        nonce: &[u8],
        aad: &[u8],
        in_out: &'a mut [u8],
    ) -> Result<&'a [u8], Invalid> {
        if nonce.len() != Self::NONCE_LEN {
            return Err(Invalid::Nonce);
        }
        let tag_at = in_out.len() - Self::TAG_LEN;
        let tag = self
            .cipher
            .encrypt_in_place_detached(XNonce::from_slice(nonce), aad, &mut in_out[..tag_at])
            .map_err(|_| Invalid::BufSize)?;
        in_out[tag_at..].copy_from_slice(tag.as_slice());
        Ok(in_out)
    }

    fn open_in_place<'a>(
        &self,
        nonce: &[u8],
        aad: &[u8],
        in_out: &'a mut [u8],
    ) -> Result<&'a [u8], NotAuthentic> {
        if nonce.len() != Self::NONCE_LEN || in_out.len() < Self::TAG_LEN {
            return Err(NotAuthentic);
        }
        let tag_at = in_out.len() - Self::TAG_LEN;
        let (msg, tag) = in_out.split_at_mut(tag_at);
        self.cipher
            .decrypt_in_place_detached(XNonce::from_slice(nonce), aad, msg, Tag::from_slice(tag))
            .map_err(|_| NotAuthentic)?;
        Ok(&in_out[..tag_at])
    }
}
