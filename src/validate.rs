//! Lexical checks on attribute text: integers, booleans, OIDs and DNs.

/// `numericoid = number 1*( DOT number )`, numbers without leading zeros.
pub fn is_valid_oid(s: &str) -> bool {
    let mut arcs = 0;
    for arc in s.split('.') {
        if arc.is_empty() || !arc.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        if arc.len() > 1 && arc.starts_with('0') {
            return false;
        }
        if arcs == 0 && !matches!(arc, "0" | "1" | "2") {
            return false;
        }
        arcs += 1;
    }
    arcs >= 2
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

pub fn parse_u32(s: &str) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn is_attribute_type(s: &str) -> bool {
    let s = s.trim();
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() => {
            bytes.all(|b| b.is_ascii_alphanumeric() || b == b'-')
        }
        Some(b) if b.is_ascii_digit() => is_valid_oid(s),
        _ => false,
    }
}

fn is_hex_pair(b: &[u8]) -> bool {
    b.len() >= 2 && b[0].is_ascii_hexdigit() && b[1].is_ascii_hexdigit()
}

/// Splits `s` on `sep` outside of escapes and quotes. Returns `None` when an
/// escape or quote is left unterminated.
fn split_unescaped(s: &str, seps: &[u8]) -> Option<Vec<(usize, usize)>> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut quoted = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                if i + 1 >= bytes.len() {
                    return None;
                }
                i += 2;
                continue;
            }
            b'"' => quoted = !quoted,
            b if !quoted && seps.contains(&b) => {
                parts.push((start, i));
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if quoted {
        return None;
    }
    parts.push((start, bytes.len()));
    Some(parts)
}

fn is_attribute_value(v: &str) -> bool {
    let v = v.trim();
    let bytes = v.as_bytes();
    if let Some(hex) = v.strip_prefix('#') {
        return !hex.is_empty() && hex.len() % 2 == 0 && hex.bytes().all(|b| b.is_ascii_hexdigit());
    }
    if bytes.len() >= 2 && bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
        return true;
    }
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let rest = &bytes[i + 1..];
                if is_hex_pair(rest) {
                    i += 3;
                    continue;
                }
                match rest.first() {
                    Some(b' ' | b'"' | b'#' | b'+' | b',' | b';' | b'<' | b'=' | b'>' | b'\\') => i += 2,
                    _ => return false,
                }
            }
            b'"' | b'<' | b'>' | b';' | b',' | 0 => return false,
            _ => i += 1,
        }
    }
    true
}

fn is_valid_ava(ava: &str) -> bool {
    match ava.find('=') {
        Some(eq) => is_attribute_type(&ava[..eq]) && is_attribute_value(&ava[eq + 1..]),
        None => false,
    }
}

/// One relative distinguished name, `+`-separated assertions allowed.
pub fn is_valid_rdn(s: &str) -> bool {
    match split_unescaped(s, b"+") {
        Some(avas) => avas.iter().all(|&(a, b)| is_valid_ava(&s[a..b])),
        None => false,
    }
}

/// RFC 4514 distinguished name; the empty string is the root DSE.
pub fn is_valid_dn(s: &str) -> bool {
    if s.trim().is_empty() {
        return true;
    }
    match split_unescaped(s, b",;") {
        Some(rdns) => rdns.iter().all(|&(a, b)| is_valid_rdn(&s[a..b])),
        None => false,
    }
}

#[test]
fn oid_test() {
    assert!(is_valid_oid("1.2.840.113556.1.4.319"));
    assert!(is_valid_oid("2.16.840.1.113730.3.4.2"));
    assert!(!is_valid_oid("1"));
    assert!(!is_valid_oid("1..2"));
    assert!(!is_valid_oid("1.02"));
    assert!(!is_valid_oid("3.1"));
    assert!(!is_valid_oid("cn"));
    assert!(!is_valid_oid(""));
}

#[test]
fn bool_and_int_test() {
    assert_eq!(parse_bool("1"), Some(true));
    assert_eq!(parse_bool("true"), Some(true));
    assert_eq!(parse_bool("0"), Some(false));
    assert_eq!(parse_bool("false"), Some(false));
    assert_eq!(parse_bool("maybe"), None);
    assert_eq!(parse_u32("42"), Some(42));
    assert_eq!(parse_u32("-1"), None);
    assert_eq!(parse_u32("+1"), None);
    assert_eq!(parse_u32("99999999999"), None);
}

#[test]
fn dn_test() {
    assert!(is_valid_dn(""));
    assert!(is_valid_dn("dc=example,dc=com"));
    assert!(is_valid_dn("cn=John Doe, ou=people, dc=example, dc=com"));
    assert!(is_valid_dn("cn=Smith\\, John+uid=js,o=acme"));
    assert!(is_valid_dn("cn=\\23hash,o=acme"));
    assert!(is_valid_dn("2.5.4.3=#04024869,o=acme"));
    assert!(is_valid_dn("cn=\"quoted, value\",o=acme"));
    assert!(!is_valid_dn("example"));
    assert!(!is_valid_dn("cn=a,,dc=com"));
    assert!(!is_valid_dn("=value"));
    assert!(!is_valid_dn("cn=trailing\\"));
    assert!(is_valid_dn("cn=a=b,o=acme"));
    assert!(is_valid_dn("uid=abc==,o=x"));
}

#[test]
fn rdn_test() {
    assert!(is_valid_rdn("cn=new"));
    assert!(is_valid_rdn("cn=a+sn=b"));
    assert!(!is_valid_rdn("cn=a,dc=b"));
    assert!(is_valid_rdn("cn=a=b"));
}
