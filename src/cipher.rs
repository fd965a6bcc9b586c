use aes::cipher::{block_padding::Pkcs7, generic_array::GenericArray, BlockDecryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Symmetric cipher seam for the extractor. An empty return string signals
/// decryption failure (wrong password, i.e. a stale key schedule).
pub trait Cipher {
    fn decrypt(&self, ciphertext: &str, password: &str) -> String;
}

/// crypto-js convention: base64 blob starting with `Salted__` + 8 salt bytes,
/// key and IV derived from the password via MD5 EVP_BytesToKey, AES-256-CBC
/// with PKCS#7 padding. Matches `openssl enc -aes-256-cbc -md md5`.
pub struct SaltedCipher;

impl Cipher for SaltedCipher {
    fn decrypt(&self, ciphertext: &str, password: &str) -> String {
        decrypt_salted(ciphertext, password).unwrap_or_default()
    }
}

fn decrypt_salted(ciphertext: &str, password: &str) -> Option<String> {
    let blob = STANDARD.decode(ciphertext).ok()?;
    if blob.len() < 16 || !blob.starts_with(b"Salted__") {
        return None;
    }
    let salt = &blob[8..16];
    let body = &blob[16..];
    if body.is_empty() || body.len() % 16 != 0 {
        return None;
    }

    let (key, iv) = derive_key_iv(password.as_bytes(), salt);
    let mut buf = body.to_vec();
    let plain = Aes256CbcDec::new(GenericArray::from_slice(&key), GenericArray::from_slice(&iv))
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .ok()?;
    String::from_utf8(plain.to_vec()).ok()
}

/// OpenSSL EVP_BytesToKey with MD5 and one iteration: D_1 = md5(pass||salt),
/// D_n = md5(D_{n-1}||pass||salt), concatenated until 48 bytes cover the
/// 32-byte key and 16-byte IV.
fn derive_key_iv(password: &[u8], salt: &[u8]) -> ([u8; 32], [u8; 16]) {
    let mut derived = Vec::with_capacity(48);
    let mut block: Vec<u8> = Vec::new();
    while derived.len() < 48 {
        let mut input = block.clone();
        input.extend_from_slice(password);
        input.extend_from_slice(salt);
        block = md5::compute(&input).to_vec();
        derived.extend_from_slice(&block);
    }
    let mut key = [0u8; 32];
    let mut iv = [0u8; 16];
    key.copy_from_slice(&derived[..32]);
    iv.copy_from_slice(&derived[32..48]);
    (key, iv)
}
