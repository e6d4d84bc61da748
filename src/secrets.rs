//! Secret generation for the environment file
//!
//! The admin password keeps only the alphanumeric characters of a base64
//! encoding, so it carries less entropy than its length suggests (about
//! 71 bits for 12 characters).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;

/// Random bytes behind the JWT signing key
pub const JWT_SECRET_BYTES: usize = 32;

/// Length of the generated admin password
pub const PASSWORD_LEN: usize = 12;

const PASSWORD_SOURCE_BYTES: usize = 16;

/// 32 random bytes, hex encoded (64 characters)
pub fn jwt_secret() -> String {
    let mut bytes = [0u8; JWT_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 12 alphanumeric characters drawn from base64 of random bytes
pub fn admin_password() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let mut bytes = [0u8; PASSWORD_SOURCE_BYTES];
        rng.fill_bytes(&mut bytes);
        if let Some(password) = password_from_bytes(&bytes) {
            return password;
        }
    }
}

/// Strip padding and symbols from the base64 form; `None` if too few remain
fn password_from_bytes(bytes: &[u8]) -> Option<String> {
    let password: String = STANDARD
        .encode(bytes)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(PASSWORD_LEN)
        .collect();
    (password.len() == PASSWORD_LEN).then_some(password)
}
