//! Query shape fingerprinting
//!
//! Normalizing a raw SQL string into a canonical shape is an external
//! concern; the aggregation engine only requires the [`Fingerprinter`] seam.
//! The [`DefaultFingerprinter`] shipped here is a deliberately modest
//! normalizer: it collapses whitespace, lowercases, and replaces string and
//! numeric literals with `?`. Deployments that need parity with a specific
//! fingerprint dialect inject their own implementation.

use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Canonical shape of a query plus its short stable identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDigest {
    /// Canonical query text with literal values stripped.
    pub digest_text: String,
    /// Short stable identifier derived from `digest_text`.
    pub digest: String,
}

/// Computes the canonical shape and digest of a raw SQL string.
///
/// Implementations must be pure: the same input always yields the same
/// output, with no side effects.
pub trait Fingerprinter: Send + Sync {
    /// Normalize `sql` and derive its digest.
    fn fingerprint(&self, sql: &str) -> QueryDigest;
}

/// Whitespace-collapsing, literal-stripping fingerprinter.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFingerprinter;

impl Fingerprinter for DefaultFingerprinter {
    fn fingerprint(&self, sql: &str) -> QueryDigest {
        let digest_text = normalize(sql);
        let digest = digest_id(&digest_text);
        QueryDigest {
            digest_text,
            digest,
        }
    }
}

/// Collapse whitespace, lowercase, and replace literals with `?`.
fn normalize(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut pending_space = false;
    // True when the previously emitted char can extend an identifier, so a
    // digit following it (table2, col_3) is not a numeric literal.
    let mut in_word = false;

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            pending_space = true;
            in_word = false;
            continue;
        }
        if pending_space {
            if !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
        }

        match c {
            '\'' | '"' => {
                skip_string_literal(&mut chars, c);
                out.push('?');
                in_word = false;
            }
            _ if c.is_ascii_digit() && !in_word => {
                // Numeric literal: swallow the remaining digits, hex chars
                // and decimal point.
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '.' {
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push('?');
                in_word = false;
            }
            _ => {
                out.push(c.to_ascii_lowercase());
                in_word = c.is_ascii_alphanumeric() || c == '_';
            }
        }
    }

    out
}

/// Consume a quoted literal, honoring backslash escapes and doubled quotes.
/// Unterminated literals swallow the rest of the input.
fn skip_string_literal(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, quote: char) {
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == quote {
            if chars.peek() == Some(&quote) {
                chars.next();
            } else {
                break;
            }
        }
    }
}

/// 16-hex-digit SipHash-1-3 identifier of the normalized text.
fn digest_id(digest_text: &str) -> String {
    let mut hasher = SipHasher13::new();
    hasher.write(digest_text.as_bytes());
    format!("0x{:016X}", hasher.finish())
}
