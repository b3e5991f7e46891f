use rand::Rng;

const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const TOKEN_LEN: usize = 6;

pub const CAPTURE_EXTENSION: &str = "jpg";

/// Short lowercase base36 token.
pub fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// `<unix millis>_<token>`; unique without coordination.
pub fn generate_stem() -> String {
    format!("{}_{}", chrono::Utc::now().timestamp_millis(), random_token())
}

/// Upload filename for a fresh capture, e.g. `1700000000000_k3x9qa.jpg`.
pub fn generate_file_name() -> String {
    format!("{}.{}", generate_stem(), CAPTURE_EXTENSION)
}

/// Checks the `<digits>_<base36>.jpg` shape.
pub fn is_generated_file_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".jpg") else {
        return false;
    };
    let Some((timestamp, token)) = stem.split_once('_') else {
        return false;
    };
    !timestamp.is_empty()
        && timestamp.bytes().all(|b| b.is_ascii_digit())
        && !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}
