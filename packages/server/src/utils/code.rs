use rand::Rng;

/// Number of digits in a confirmation code.
pub const CODE_LENGTH: usize = 6;

/// Generate a zero-padded numeric confirmation code.
pub fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..10u32.pow(CODE_LENGTH as u32));
    format!("{n:0width$}", width = CODE_LENGTH)
}
