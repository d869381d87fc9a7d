pub mod account;
pub mod claim;
pub mod meal;
pub mod notification;
pub mod otp;

/// Uniform random string over `charset`.
pub(crate) fn random_string(charset: &[u8], len: usize) -> String {
    use rand::RngExt;
    let mut rng = rand::rng();
    (0..len)
        .map(|_| charset[rng.random_range(0..charset.len())] as char)
        .collect()
}
