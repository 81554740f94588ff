//! Naming-convention helpers

/// Derive a default table name from an entity type name: `RobotPart`
/// becomes `robot_part`. Runs of capitals stay together (`HTTPLog`
/// becomes `http_log`).
pub fn uncamelize(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && chars[i - 1].is_lowercase();
            let next_lower = i + 1 < chars.len() && chars[i + 1].is_lowercase();
            if i > 0 && (prev_lower || (chars[i - 1].is_uppercase() && next_lower)) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(*c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncamelize() {
        assert_eq!(uncamelize("Robots"), "robots");
        assert_eq!(uncamelize("RobotPart"), "robot_part");
        assert_eq!(uncamelize("HTTPLog"), "http_log");
        assert_eq!(uncamelize("already_snake"), "already_snake");
    }
}
