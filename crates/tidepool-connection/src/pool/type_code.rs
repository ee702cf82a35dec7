//! Connection type codes
//!
//! A type code fingerprints the (url, user, password) triple a connection was
//! opened for. The pool compares codes to notice that its target changed
//! underneath a pooled connection.

use ring::digest;

/// Compute the type code for a connection target.
///
/// Fields are NUL-separated so that moving characters between them changes
/// the code; the password never leaves this function in clear form.
pub fn connection_type_code(url: &str, username: Option<&str>, password: Option<&str>) -> u64 {
    let mut ctx = digest::Context::new(&digest::SHA256);
    ctx.update(url.as_bytes());
    ctx.update(&[0]);
    ctx.update(username.unwrap_or_default().as_bytes());
    ctx.update(&[0]);
    ctx.update(password.unwrap_or_default().as_bytes());

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&ctx.finish().as_ref()[..8]);
    u64::from_be_bytes(prefix)
}
