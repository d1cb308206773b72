use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::VariantResult;

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn file_digest(path: &Path) -> VariantResult<String> {
    let bytes = std::fs::read(path)?;
    Ok(sha256_hex(&bytes))
}
