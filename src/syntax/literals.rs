//! Decoding of Python literal tokens.
//!
//! String prefixes, quote styles and escape sequences are resolved here so the
//! parser only ever hands finished values to the syntax tree. Integers keep
//! arbitrary precision by converting to canonical decimal text.

use super::ConstantValue;

/// Prefix flags and quote layout of a single string token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StringPrefix {
    pub raw: bool,
    pub bytes: bool,
    pub unicode: bool,
    pub format: bool,
}

/// A string token split into prefix, quote and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringToken<'a> {
    pub prefix: StringPrefix,
    /// Length of the opening prefix plus quote, in bytes.
    pub open_len: usize,
    /// Length of the closing quote, in bytes.
    pub close_len: usize,
    pub body: &'a str,
}

pub fn split_string_token(text: &str) -> Result<StringToken<'_>, String> {
    let quote_at = text
        .find(['\'', '"'])
        .ok_or_else(|| format!("malformed string literal {text}"))?;
    let mut prefix = StringPrefix::default();
    for c in text[..quote_at].chars() {
        match c.to_ascii_lowercase() {
            'r' => prefix.raw = true,
            'b' => prefix.bytes = true,
            'u' => prefix.unicode = true,
            'f' => prefix.format = true,
            other => return Err(format!("unsupported string prefix '{other}'")),
        }
    }
    let rest = &text[quote_at..];
    let quote = &rest[..1];
    let triple = quote.repeat(3);
    let quote_len = if rest.starts_with(&triple) && rest.len() >= 6 {
        3
    } else {
        1
    };
    if rest.len() < quote_len * 2 {
        return Err(format!("unterminated string literal {text}"));
    }
    Ok(StringToken {
        prefix,
        open_len: quote_at + quote_len,
        close_len: quote_len,
        body: &rest[quote_len..rest.len() - quote_len],
    })
}

// ============================================================================
// ESCAPES
// ============================================================================

const UNKNOWN_NAME: &str =
    "(unicode error) 'unicodeescape' codec can't decode bytes: unknown Unicode character name";
const MALFORMED_NAME: &str =
    "(unicode error) 'unicodeescape' codec can't decode bytes: malformed \\N character escape";

/// Resolves escapes in a `str` literal body, including `\N{NAME}` lookups in
/// the Unicode name table.
pub fn decode_str_body(body: &str, raw: bool) -> Result<String, String> {
    if raw {
        return Ok(body.to_string());
    }
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0b}'),
            'N' => out.push(read_char_name(&mut chars)?),
            '0'..='7' => {
                let code = read_octal(next, &mut chars);
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                match read_hex(&mut chars, width) {
                    Some(code) => out.push(char::from_u32(code).unwrap_or('\u{fffd}')),
                    None => {
                        out.push('\\');
                        out.push(next);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

/// Reads the `{NAME}` part of a `\N` escape.
fn read_char_name(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<char, String> {
    if chars.next_if_eq(&'{').is_none() {
        return Err(MALFORMED_NAME.into());
    }
    let mut name = String::new();
    loop {
        match chars.next() {
            Some('}') => break,
            Some(c) => name.push(c),
            None => return Err(MALFORMED_NAME.into()),
        }
    }
    if name.is_empty() {
        return Err(MALFORMED_NAME.into());
    }
    unicode_names2::character(&name.to_ascii_uppercase()).ok_or_else(|| UNKNOWN_NAME.to_string())
}

/// Resolves escapes in a `bytes` literal body.
pub fn decode_bytes_body(body: &str, raw: bool) -> Result<Vec<u8>, String> {
    if !body.is_ascii() {
        return Err("bytes can only contain ASCII literal characters".into());
    }
    if raw {
        return Ok(body.as_bytes().to_vec());
    }
    let mut out = Vec::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c as u8);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push(b'\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' => out.push(b'\\'),
            '\'' => out.push(b'\''),
            '"' => out.push(b'"'),
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            '0'..='7' => out.push((read_octal(next, &mut chars) & 0xff) as u8),
            'x' => match read_hex(&mut chars, 2) {
                Some(code) => out.push(code as u8),
                None => return Err("invalid \\x escape in bytes literal".into()),
            },
            other => {
                out.push(b'\\');
                out.push(other as u8);
            }
        }
    }
    Ok(out)
}

/// Decodes a literal segment of an f-string: doubled braces collapse, then
/// ordinary escapes apply.
pub fn decode_fstring_segment(segment: &str, raw: bool) -> Result<String, String> {
    let collapsed = segment.replace("{{", "{").replace("}}", "}");
    decode_str_body(&collapsed, raw)
}

fn read_octal(first: char, chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u32 {
    let mut code = first.to_digit(8).unwrap_or(0);
    for _ in 0..2 {
        match chars.peek().and_then(|c| c.to_digit(8)) {
            Some(d) => {
                code = code * 8 + d;
                chars.next();
            }
            None => break,
        }
    }
    code
}

fn read_hex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, width: usize) -> Option<u32> {
    let mut code = 0u32;
    for _ in 0..width {
        let d = chars.peek()?.to_digit(16)?;
        code = code * 16 + d;
        chars.next();
    }
    Some(code)
}

// ============================================================================
// NUMBERS
// ============================================================================

/// Parses an `integer` or `float` token, including imaginary suffixes.
pub fn parse_number(text: &str) -> Result<ConstantValue, String> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    if let Some(imag) = lower.strip_suffix('j') {
        let value = imag
            .parse::<f64>()
            .map_err(|_| format!("invalid imaginary literal {text}"))?;
        return Ok(ConstantValue::Complex(value));
    }
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else if lower.contains(['.', 'e']) {
        let value = lower
            .parse::<f64>()
            .map_err(|_| format!("invalid float literal {text}"))?;
        return Ok(ConstantValue::Float(value));
    } else {
        (lower.trim_end_matches('l'), 10)
    };
    to_decimal(digits, radix)
        .map(ConstantValue::Int)
        .ok_or_else(|| format!("invalid integer literal {text}"))
}

/// Converts digits in `radix` to canonical decimal text without a size limit.
pub fn to_decimal(digits: &str, radix: u32) -> Option<String> {
    const LIMB: u64 = 1_000_000_000;
    if digits.is_empty() {
        return None;
    }
    let mut limbs: Vec<u64> = vec![0];
    for c in digits.chars() {
        let mut carry = u64::from(c.to_digit(radix)?);
        for limb in limbs.iter_mut() {
            let value = *limb * u64::from(radix) + carry;
            *limb = value % LIMB;
            carry = value / LIMB;
        }
        while carry > 0 {
            limbs.push(carry % LIMB);
            carry /= LIMB;
        }
    }
    let mut out = String::new();
    let mut iter = limbs.iter().rev();
    if let Some(top) = iter.next() {
        out.push_str(&top.to_string());
    }
    for limb in iter {
        out.push_str(&format!("{limb:09}"));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_and_quotes() {
        let token = split_string_token("rb'''a\\n'''").unwrap();
        assert!(token.prefix.raw && token.prefix.bytes);
        assert_eq!(token.body, "a\\n");
        assert_eq!(token.open_len, 5);
        let empty = split_string_token("''").unwrap();
        assert_eq!(empty.body, "");
        assert_eq!(empty.close_len, 1);
    }

    #[test]
    fn str_escapes() {
        assert_eq!(decode_str_body(r"a\tb\x41é\101\\", false).unwrap(), "a\tbAéA\\");
        assert_eq!(decode_str_body(r"\d", false).unwrap(), "\\d");
        assert_eq!(decode_str_body(r"a\tb", true).unwrap(), r"a\tb");
        assert_eq!(decode_str_body("a\\\nb", false).unwrap(), "ab");
    }

    #[test]
    fn named_unicode_escapes() {
        assert_eq!(decode_str_body(r"a\N{EM DASH}b", false).unwrap(), "a\u{2014}b");
        assert_eq!(decode_str_body(r"\N{latin small letter e with acute}", false).unwrap(), "é");
        assert_eq!(decode_str_body(r"\N{EM DASH}", true).unwrap(), r"\N{EM DASH}");
        assert!(decode_str_body(r"\N{NO SUCH CHARACTER}", false)
            .unwrap_err()
            .ends_with("unknown Unicode character name"));
        assert!(decode_str_body(r"\N{EM DASH", false).is_err());
    }

    #[test]
    fn bytes_escapes() {
        assert_eq!(decode_bytes_body(r"\x00\xff-\n", false).unwrap(), vec![0, 255, b'-', b'\n']);
        assert!(decode_bytes_body("é", false).is_err());
    }

    #[test]
    fn fstring_segments_collapse_braces() {
        assert_eq!(decode_fstring_segment("{{x}}\\n", false).unwrap(), "{x}\n");
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_number("0x_ff"), Ok(ConstantValue::Int("255".into())));
        assert_eq!(parse_number("0b101"), Ok(ConstantValue::Int("5".into())));
        assert_eq!(parse_number("1_000"), Ok(ConstantValue::Int("1000".into())));
        assert_eq!(parse_number("1.5"), Ok(ConstantValue::Float(1.5)));
        assert_eq!(parse_number("1e3"), Ok(ConstantValue::Float(1000.0)));
        assert_eq!(parse_number("2j"), Ok(ConstantValue::Complex(2.0)));
        assert_eq!(
            parse_number("0xFFFFFFFFFFFFFFFFFFFF"),
            Ok(ConstantValue::Int("1208925819614629174706175".into()))
        );
    }
}
