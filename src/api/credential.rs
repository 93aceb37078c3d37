//! Purpose: Turn plaintext passwords into storable tokens and check them later.
//! Exports: `CredentialCodec`, `SaltedSha256`.
//! Role: Pluggable collaborator for login helpers; the table layer never calls it.
//! Invariants: Tokens are self-contained strings; malformed tokens never verify.

use getrandom::fill as fill_random;
use sha2::{Digest, Sha256};

use crate::core::error::{Error, ErrorKind};

pub trait CredentialCodec {
    fn encode(&self, secret: &str) -> Result<String, Error>;
    fn verify(&self, secret: &str, token: &str) -> bool;
}

const SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;

/// `sha256$<salt-hex>$<digest-hex>` where digest = SHA-256(salt || secret).
#[derive(Clone, Copy, Debug, Default)]
pub struct SaltedSha256;

impl SaltedSha256 {
    fn digest(salt: &[u8], secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(secret.as_bytes());
        hex_encode(&hasher.finalize())
    }
}

impl CredentialCodec for SaltedSha256 {
    fn encode(&self, secret: &str) -> Result<String, Error> {
        let mut salt = [0u8; SALT_LEN];
        fill_random(&mut salt).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message(format!("failed to generate password salt: {err}"))
        })?;
        Ok(format!(
            "{SCHEME}${}${}",
            hex_encode(&salt),
            Self::digest(&salt, secret)
        ))
    }

    fn verify(&self, secret: &str, token: &str) -> bool {
        let mut parts = token.split('$');
        let (Some(scheme), Some(salt), Some(digest), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        if scheme != SCHEME {
            return false;
        }
        match hex_decode(salt) {
            Some(salt) => constant_time_eq(Self::digest(&salt, secret).as_bytes(), digest.as_bytes()),
            None => false,
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(nibble_hex(byte >> 4));
        out.push(nibble_hex(byte & 0x0f));
    }
    out
}

fn nibble_hex(nibble: u8) -> char {
    match nibble {
        0..=9 => char::from(b'0' + nibble),
        _ => char::from(b'a' + (nibble - 10)),
    }
}

fn hex_decode(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|idx| u8::from_str_radix(text.get(idx..idx + 2)?, 16).ok())
        .collect()
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
