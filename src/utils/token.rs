use rand::distributions::Alphanumeric;
use rand::Rng;

/// Random ASCII letters and digits, used for throwaway usernames and passwords.
pub fn generate_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn generate_username() -> String {
    generate_token(8)
}

pub fn generate_password() -> String {
    generate_token(16)
}
