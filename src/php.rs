use thiserror::Error;

/// Codec for the platform's PHP serialization format, used by the
/// `options` and `usermeta` tables (sticky registry, role/capability
/// maps). Decoding happens at the persistence-adapter boundary; nothing
/// above the adapters sees the wire format. Encoding round-trips
/// byte-exactly for the subset we emit so that external readers of the
/// same tables keep working.
#[derive(Debug, Clone, PartialEq)]
pub enum PhpValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Arr(Vec<(PhpValue, PhpValue)>),
}

#[derive(Error, Debug)]
pub enum PhpError {
    #[error("unexpected end of input at byte {0}")]
    Eof(usize),
    #[error("unexpected byte {1:?} at offset {0}")]
    Unexpected(usize, char),
    #[error("invalid number at offset {0}")]
    BadNumber(usize),
    #[error("string is not valid utf-8 at offset {0}")]
    BadUtf8(usize),
}

impl PhpValue {
    pub fn is_truthy(&self) -> bool {
        match self {
            PhpValue::Null => false,
            PhpValue::Bool(b) => *b,
            PhpValue::Int(i) => *i != 0,
            PhpValue::Float(f) => *f != 0.0,
            PhpValue::Str(s) => !s.is_empty() && s != "0",
            PhpValue::Arr(a) => !a.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PhpValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn entries(&self) -> &[(PhpValue, PhpValue)] {
        match self {
            PhpValue::Arr(a) => a,
            _ => &[],
        }
    }

    /// String-keyed lookup in an array value.
    pub fn get(&self, key: &str) -> Option<&PhpValue> {
        self.entries().iter().find_map(|(k, v)| match k {
            PhpValue::Str(s) if s == key => Some(v),
            _ => None,
        })
    }

    /// Interprets an array value as a list of integers, in order.
    /// Non-integer entries are skipped.
    pub fn int_list(&self) -> Vec<i64> {
        self.entries()
            .iter()
            .filter_map(|(_, v)| match v {
                PhpValue::Int(i) => Some(*i),
                PhpValue::Str(s) => s.parse().ok(),
                _ => None,
            })
            .collect()
    }

    /// Builds the canonical list encoding (sequential integer keys from 0).
    pub fn from_int_list(ids: &[i64]) -> Self {
        PhpValue::Arr(
            ids.iter()
                .enumerate()
                .map(|(i, id)| (PhpValue::Int(i as i64), PhpValue::Int(*id)))
                .collect(),
        )
    }
}

pub fn decode(input: &str) -> Result<PhpValue, PhpError> {
    let mut p = Parser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    let value = p.value()?;
    Ok(value)
}

pub fn encode(value: &PhpValue) -> String {
    let mut out = String::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &PhpValue, out: &mut String) {
    match value {
        PhpValue::Null => out.push_str("N;"),
        PhpValue::Bool(b) => {
            out.push_str(if *b { "b:1;" } else { "b:0;" });
        }
        PhpValue::Int(i) => {
            out.push_str(&format!("i:{};", i));
        }
        PhpValue::Float(f) => {
            out.push_str(&format!("d:{};", f));
        }
        PhpValue::Str(s) => {
            out.push_str(&format!("s:{}:\"{}\";", s.len(), s));
        }
        PhpValue::Arr(entries) => {
            out.push_str(&format!("a:{}:{{", entries.len()));
            for (k, v) in entries {
                encode_into(k, out);
                encode_into(v, out);
            }
            out.push('}');
        }
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Result<u8, PhpError> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or(PhpError::Eof(self.pos))
    }

    fn expect(&mut self, b: u8) -> Result<(), PhpError> {
        let got = self.peek()?;
        if got != b {
            return Err(PhpError::Unexpected(self.pos, got as char));
        }
        self.pos += 1;
        Ok(())
    }

    fn take_until(&mut self, stop: u8) -> Result<&'a str, PhpError> {
        let start = self.pos;
        while self.peek()? != stop {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).map_err(|_| PhpError::BadUtf8(start))
    }

    fn int_until(&mut self, stop: u8) -> Result<i64, PhpError> {
        let start = self.pos;
        self.take_until(stop)?
            .parse()
            .map_err(|_| PhpError::BadNumber(start))
    }

    fn value(&mut self) -> Result<PhpValue, PhpError> {
        let tag = self.peek()?;
        self.pos += 1;
        match tag {
            b'N' => {
                self.expect(b';')?;
                Ok(PhpValue::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let raw = self.int_until(b';')?;
                self.expect(b';')?;
                Ok(PhpValue::Bool(raw != 0))
            }
            b'i' => {
                self.expect(b':')?;
                let raw = self.int_until(b';')?;
                self.expect(b';')?;
                Ok(PhpValue::Int(raw))
            }
            b'd' => {
                self.expect(b':')?;
                let start = self.pos;
                let raw = self.take_until(b';')?;
                let f = raw.parse().map_err(|_| PhpError::BadNumber(start))?;
                self.expect(b';')?;
                Ok(PhpValue::Float(f))
            }
            b's' => {
                self.expect(b':')?;
                let len_at = self.pos;
                let len = usize::try_from(self.int_until(b':')?)
                    .map_err(|_| PhpError::BadNumber(len_at))?;
                self.expect(b':')?;
                self.expect(b'"')?;
                let start = self.pos;
                let end = start
                    .checked_add(len)
                    .filter(|&end| end <= self.bytes.len())
                    .ok_or(PhpError::Eof(start))?;
                let s = std::str::from_utf8(&self.bytes[start..end])
                    .map_err(|_| PhpError::BadUtf8(start))?
                    .to_string();
                self.pos = end;
                self.expect(b'"')?;
                self.expect(b';')?;
                Ok(PhpValue::Str(s))
            }
            b'a' => {
                self.expect(b':')?;
                let count_at = self.pos;
                let count = usize::try_from(self.int_until(b':')?)
                    .map_err(|_| PhpError::BadNumber(count_at))?;
                self.expect(b':')?;
                self.expect(b'{')?;
                // Every entry takes at least four bytes ("N;N;"), so a
                // count past that bound cannot be satisfied by the
                // remaining input.
                if count > (self.bytes.len() - self.pos) / 4 + 1 {
                    return Err(PhpError::Eof(self.pos));
                }
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.value()?;
                    let val = self.value()?;
                    entries.push((key, val));
                }
                self.expect(b'}')?;
                Ok(PhpValue::Arr(entries))
            }
            other => Err(PhpError::Unexpected(self.pos - 1, other as char)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_sticky_list() {
        let v = decode("a:3:{i:0;i:5;i:1;i:12;i:2;i:42;}").unwrap();
        assert_eq!(v.int_list(), vec![5, 12, 42]);
    }

    #[test]
    fn int_list_round_trips_byte_exactly() {
        let raw = "a:2:{i:0;i:7;i:1;i:9;}";
        let v = decode(raw).unwrap();
        assert_eq!(encode(&v), raw);
        assert_eq!(encode(&PhpValue::from_int_list(&[7, 9])), raw);
    }

    #[test]
    fn decodes_role_blob() {
        let raw = concat!(
            "a:1:{s:6:\"editor\";a:2:{s:4:\"name\";s:6:\"Editor\";",
            "s:12:\"capabilities\";a:2:{s:10:\"edit_posts\";b:1;",
            "s:13:\"publish_posts\";b:0;}}}"
        );
        let v = decode(raw).unwrap();
        let editor = v.get("editor").unwrap();
        assert_eq!(editor.get("name").unwrap().as_str(), Some("Editor"));
        let caps = editor.get("capabilities").unwrap();
        assert!(caps.get("edit_posts").unwrap().is_truthy());
        assert!(!caps.get("publish_posts").unwrap().is_truthy());
        assert_eq!(encode(&v), raw);
    }

    #[test]
    fn string_lengths_are_byte_lengths() {
        let raw = "s:6:\"caf\u{e9}s\";";
        let v = decode(raw).unwrap();
        assert_eq!(v.as_str(), Some("caf\u{e9}s"));
        assert_eq!(encode(&v), raw);
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(decode("a:2:{i:0;i:5;").is_err());
        assert!(decode("s:10:\"short\";").is_err());
    }

    #[test]
    fn rejects_hostile_lengths_without_panicking() {
        // Negative and near-usize::MAX string lengths.
        assert!(decode("s:-1:\"x\";").is_err());
        assert!(decode("s:9223372036854775807:\"x\";").is_err());
        // Array counts that the remaining input cannot satisfy.
        assert!(decode("a:-1:{}").is_err());
        assert!(decode("a:9223372036854775807:{}").is_err());
        assert!(decode("a:1000:{i:0;i:1;}").is_err());
    }
}
