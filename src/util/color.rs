use rand::Rng;

/// Colors handed out to new groups, in order, before falling back to random.
pub const PALETTE: [&str; 10] = [
    "#FF5733", // orange
    "#33FF57", // green
    "#3357FF", // blue
    "#FF33A1", // pink
    "#A133FF", // purple
    "#33FFF6", // cyan
    "#FF8F33", // amber
    "#8FFF33", // lime
    "#FF3333", // red
    "#33FF8F", // mint
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorError {
    #[error("invalid color {0:?}: expected 6 or 8 hex digits with optional leading #")]
    InvalidColor(String),
}

/// Validate a hex color and return it in canonical form: `#` followed by
/// uppercase digits. Accepts `RRGGBB` and `RRGGBBAA`, with or without `#`.
pub fn normalize_hex(input: &str) -> Result<String, ColorError> {
    let digits = input.trim();
    let digits = digits.strip_prefix('#').unwrap_or(digits);
    if !matches!(digits.len(), 6 | 8) || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ColorError::InvalidColor(input.to_string()));
    }
    Ok(format!("#{}", digits.to_ascii_uppercase()))
}

/// Compare two colors by canonical value. Invalid colors never match.
pub fn same_color(a: &str, b: &str) -> bool {
    match (normalize_hex(a), normalize_hex(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// A uniformly random opaque color, e.g. `#1A2B3C`.
pub fn random_hex_color(rng: &mut impl Rng) -> String {
    let (r, g, b): (u8, u8, u8) = rng.r#gen();
    format!("#{:02X}{:02X}{:02X}", r, g, b)
}
