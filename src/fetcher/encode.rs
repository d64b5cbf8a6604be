//! POST payload percent-encoding.
//!
//! The payload arrives as pre-formatted `key=value&key=value` pairs and is
//! sent as `application/x-www-form-urlencoded` data with one compatibility
//! quirk that must be preserved: the first literal `=` is assumed to be the
//! key/value separator of the first pair and is left unescaped; every `=`
//! after it is percent-escaped. Spaces become `+`.

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

// Reserved/unsafe characters that always get escaped.
const ESCAPE_SET: &[u8] = b"\"%-.<>\\^_`{|}~[],:#@?;\r\n";

pub fn encode_post_payload(payload: &str) -> String {
    let mut dst = String::with_capacity(payload.len() * 3);
    let mut seen_eq = false;

    for c in payload.chars() {
        let escape = c.is_ascii()
            && ((seen_eq && c == '=') || ESCAPE_SET.contains(&(c as u8)));

        if escape {
            let b = c as u8;
            dst.push('%');
            dst.push(HEX_DIGITS[(b >> 4) as usize] as char);
            dst.push(HEX_DIGITS[(b & 0x0f) as usize] as char);
        } else if c == ' ' {
            dst.push('+');
        } else {
            if c == '=' {
                seen_eq = true;
            }
            dst.push(c);
        }
    }

    dst
}
