//! Wire-line decoding.
//!
//! One telemetry line is `<non-negative-integer-code>;<'1'|'0'>`, optional
//! whitespace around each field, any line terminator. Anything else is
//! noise and decodes to None; the device is expected to emit the odd
//! garbled line under normal operation, so decoding is lenient-or-skip and
//! never an error.

use super::RawSample;

/// Decode one raw wire line into a sample.
///
/// Returns None for undecodable bytes, wrong field count, a non-digit
/// code, or a press flag other than `1`/`0`.
pub(crate) fn decode_line(bytes: &[u8]) -> Option<RawSample> {
    let text = std::str::from_utf8(bytes).ok()?;

    let mut fields = text.split(';').map(str::trim);
    let code_field = fields.next()?;
    let flag_field = fields.next()?;
    if fields.next().is_some() {
        return None;
    }

    // Digits only: no sign, no decimal point, no exponent.
    if code_field.is_empty() || !code_field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let code: f64 = code_field.parse().ok()?;

    let active = match flag_field {
        "1" => true,
        "0" => false,
        _ => return None,
    };

    Some(RawSample { code, active })
}
