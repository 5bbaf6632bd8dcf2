use std::fmt;

/// A measurement in fixed-point tenths of a degree (`-12.3` is stored as `-123`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tenths(pub i64);

impl Tenths {
    /// Parse a literal of the form `-?d{1,2}.d`.
    ///
    /// # Examples
    /// ```
    /// use brc_processor::models::Tenths;
    ///
    /// assert_eq!(Tenths::parse(b"-12.3"), Some(Tenths(-123)));
    /// assert_eq!(Tenths::parse(b"5.0"), Some(Tenths(50)));
    /// assert_eq!(Tenths::parse(b"5"), None);
    /// ```
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        parse_tenths(bytes).map(|value| Tenths(i64::from(value)))
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 10.0
    }
}

impl fmt::Display for Tenths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{}{}.{}", sign, magnitude / 10, magnitude % 10)
    }
}

/// Hot-path parser: value * 10 as an integer, or `None` for any other shape.
#[inline]
pub fn parse_tenths(bytes: &[u8]) -> Option<i32> {
    let (negative, digits) = match bytes.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, bytes),
    };

    let magnitude = match *digits {
        [units, b'.', fraction] => digit(units)? * 10 + digit(fraction)?,
        [tens, units, b'.', fraction] => {
            digit(tens)? * 100 + digit(units)? * 10 + digit(fraction)?
        }
        _ => return None,
    };

    Some(if negative { -magnitude } else { magnitude })
}

#[inline(always)]
fn digit(byte: u8) -> Option<i32> {
    byte.is_ascii_digit().then(|| i32::from(byte - b'0'))
}
