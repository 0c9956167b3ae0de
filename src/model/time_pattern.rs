use serde::{Serialize, Serializer};

/// A time-of-day pattern such as `12:30`, `*:15` or `1*:*5`. Each of the
/// four digit positions is either fixed or a wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePattern {
    hour: [Option<u8>; 2],
    minute: [Option<u8>; 2],
}

impl TimePattern {
    /// Parse the textual form produced by the lexer. A bare `*` matches any
    /// time.
    pub fn parse(text: &str) -> Result<Self, String> {
        if text == "*" {
            return Ok(Self {
                hour: [None, None],
                minute: [None, None],
            });
        }
        let Some((hour, minute)) = text.split_once(':') else {
            return Err(format!("Malformed time pattern: \"{text}\""));
        };
        let hour = Self::digits(hour, text)?;
        let minute = Self::digits(minute, text)?;
        let pattern = Self { hour, minute };
        if let (Some(h), _) = pattern.fixed_parts() {
            if h > 23 {
                return Err(format!("Hour out of range in \"{text}\""));
            }
        }
        if let (_, Some(m)) = pattern.fixed_parts() {
            if m > 59 {
                return Err(format!("Minute out of range in \"{text}\""));
            }
        }
        if pattern.hour[0].is_some_and(|d| d > 2) || pattern.minute[0].is_some_and(|d| d > 5) {
            return Err(format!("Digit out of range in \"{text}\""));
        }
        Ok(pattern)
    }

    fn digits(part: &str, text: &str) -> Result<[Option<u8>; 2], String> {
        let parse_one = |c: char| -> Result<Option<u8>, String> {
            match c {
                '*' => Ok(None),
                '0'..='9' => Ok(c.to_digit(10).and_then(|d| u8::try_from(d).ok())),
                _ => Err(format!("Malformed time pattern: \"{text}\"")),
            }
        };
        let chars: Vec<char> = part.chars().collect();
        match chars.as_slice() {
            ['*'] => Ok([None, None]),
            [only] => Ok([Some(0), parse_one(*only)?]),
            [tens, ones] => Ok([parse_one(*tens)?, parse_one(*ones)?]),
            _ => Err(format!("Malformed time pattern: \"{text}\"")),
        }
    }

    /// Hour and minute when both of their digits are fixed.
    fn fixed_parts(&self) -> (Option<u8>, Option<u8>) {
        let join = |d: [Option<u8>; 2]| match d {
            [Some(t), Some(o)] => Some(t * 10 + o),
            _ => None,
        };
        (join(self.hour), join(self.minute))
    }

    pub fn matches(&self, hour: u32, minute: u32) -> bool {
        let check = |pattern: [Option<u8>; 2], value: u32| {
            let tens = value / 10;
            let ones = value % 10;
            pattern[0].map_or(true, |d| u32::from(d) == tens)
                && pattern[1].map_or(true, |d| u32::from(d) == ones)
        };
        check(self.hour, hour) && check(self.minute, minute)
    }
}

impl std::fmt::Display for TimePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digit = |d: Option<u8>| d.map_or('*', |d| char::from(b'0' + d));
        write!(
            f,
            "{}{}:{}{}",
            digit(self.hour[0]),
            digit(self.hour[1]),
            digit(self.minute[0]),
            digit(self.minute[1])
        )
    }
}

impl Serialize for TimePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fixed_time() {
        let p = TimePattern::parse("12:30").unwrap();
        assert!(p.matches(12, 30));
        assert!(!p.matches(12, 31));
        assert_eq!(p.to_string(), "12:30");
    }

    #[test]
    fn wildcards() {
        let p = TimePattern::parse("12:*4").unwrap();
        assert!(p.matches(12, 4));
        assert!(p.matches(12, 54));
        assert!(!p.matches(13, 4));

        let any_hour = TimePattern::parse("*:15").unwrap();
        assert!(any_hour.matches(0, 15));
        assert!(any_hour.matches(23, 15));

        assert!(TimePattern::parse("*").unwrap().matches(7, 42));
    }

    #[test]
    fn single_digit_hour() {
        let p = TimePattern::parse("9:05").unwrap();
        assert!(p.matches(9, 5));
        assert_eq!(p.to_string(), "09:05");
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(TimePattern::parse("24:00").is_err());
        assert!(TimePattern::parse("12:60").is_err());
        assert!(TimePattern::parse("12-30").is_err());
        assert!(TimePattern::parse("123:00").is_err());
    }
}
