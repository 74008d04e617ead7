use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Change-detection fingerprint: lowercase hex SHA-1, 40 chars.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Identity of a shared channel, derived from the sharing credentials and
/// the source channel id.
pub fn shared_channel_unique_id(api_key: &str, secret: &str, channel_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hasher.update(secret.as_bytes());
    hasher.update(channel_id.as_bytes());
    format!("{:x}", hasher.finalize())
}
