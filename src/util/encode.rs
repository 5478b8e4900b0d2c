const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// RFC 3986 encoding of a single component; `/` is escaped.
pub(crate) fn encode_component(input: &str) -> String {
    encode_with(input, is_unreserved)
}

/// RFC 3986 encoding of an object key used as a path; `/` is kept.
pub(crate) fn encode_path(input: &str) -> String {
    encode_with(input, |b| is_unreserved(b) || b == b'/')
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~')
}

fn encode_with(input: &str, keep: impl Fn(u8) -> bool) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if keep(b) {
            out.push(char::from(b));
        } else {
            out.push('%');
            out.push(char::from(HEX_UPPER[usize::from(b >> 4)]));
            out.push(char::from(HEX_UPPER[usize::from(b & 0x0F)]));
        }
    }
    out
}

/// Joins parameters in insertion order; empty or absent values render as a bare key.
pub(crate) fn wire_query_string<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut out = String::new();
    for (idx, (k, v)) in params.into_iter().enumerate() {
        if idx > 0 {
            out.push('&');
        }
        out.push_str(&encode_component(k));
        if let Some(v) = v.filter(|v| !v.is_empty()) {
            out.push('=');
            out.push_str(&encode_component(v));
        }
    }
    out
}
