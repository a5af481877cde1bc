//! Cryptogragic logics.
//!
//! Passwords are digested with SHA-256 over `password || salt` and stored as
//! lowercase hex.

use rand::Rng;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Number of characters kept from a random identifier to build a salt.
pub const SALT_LENGTH: usize = 5;
/// Avatars are picked among this many pictures.
const AVATAR_COUNT: u32 = 1000;

/// Random unique identifier, hyphen-less.
pub fn generate_uuid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Short per-account salt.
pub fn generate_salt() -> String {
    let mut salt = generate_uuid();
    salt.truncate(SALT_LENGTH);
    salt
}

/// Opaque token mailed to the user to prove email ownership.
pub fn generate_activation_code() -> String {
    generate_uuid()
}

/// Digest a raw password with its salt.
pub fn digest_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    let hash = hasher.finalize();

    hex::encode(hash)
}

/// Default avatar picked at random.
pub fn random_avatar_url() -> String {
    avatar_url(OsRng.gen_range(0..AVATAR_COUNT))
}

fn avatar_url(index: u32) -> String {
    format!("http://images.nowcoder.com/head/{index}t.png")
}
