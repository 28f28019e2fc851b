//! Reader for PHP `serialize()` output.
//!
//! Only the value types that appear in extension metadata are supported:
//! arrays, strings, integers, floats, booleans and null. Objects and
//! references are rejected.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhpSerError {
    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("expected {expected} at byte {pos}")]
    Unexpected { pos: usize, expected: &'static str },

    #[error("unsupported type tag '{tag}' at byte {pos}")]
    UnsupportedType { pos: usize, tag: char },

    #[error("trailing data at byte {0}")]
    TrailingData(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhpValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Key/value pairs in insertion order.
    Array(Vec<(PhpValue, PhpValue)>),
}

impl PhpValue {
    /// String form of a scalar, the way PHP casts array keys and values.
    pub fn as_scalar_string(&self) -> Option<String> {
        match self {
            PhpValue::Str(s) => Some(s.clone()),
            PhpValue::Int(i) => Some(i.to_string()),
            _ => None,
        }
    }
}

pub fn unserialize(input: &str) -> Result<PhpValue, PhpSerError> {
    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    let value = parser.value()?;
    if parser.pos != parser.bytes.len() {
        return Err(PhpSerError::TrailingData(parser.pos));
    }
    Ok(value)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn value(&mut self) -> Result<PhpValue, PhpSerError> {
        let tag_pos = self.pos;
        let tag = self.next()?;

        if tag == b'N' {
            self.expect(b';', "';'")?;
            return Ok(PhpValue::Null);
        }

        self.expect(b':', "':'")?;
        match tag {
            b'b' => {
                let raw = self.until(b';')?;
                match raw {
                    "0" => Ok(PhpValue::Bool(false)),
                    "1" => Ok(PhpValue::Bool(true)),
                    _ => Err(PhpSerError::Unexpected {
                        pos: tag_pos,
                        expected: "boolean 0 or 1",
                    }),
                }
            }
            b'i' => {
                let pos = self.pos;
                let raw = self.until(b';')?;
                raw.parse().map(PhpValue::Int).map_err(|_| PhpSerError::Unexpected {
                    pos,
                    expected: "integer",
                })
            }
            b'd' => {
                let pos = self.pos;
                let raw = self.until(b';')?;
                raw.parse().map(PhpValue::Float).map_err(|_| PhpSerError::Unexpected {
                    pos,
                    expected: "float",
                })
            }
            b's' => {
                let len = self.length(b':')?;
                self.expect(b'"', "opening '\"'")?;
                let end = self.pos.checked_add(len).ok_or(PhpSerError::UnexpectedEnd)?;
                let raw = self.bytes.get(self.pos..end).ok_or(PhpSerError::UnexpectedEnd)?;
                let s = String::from_utf8_lossy(raw).into_owned();
                self.pos = end;
                self.expect(b'"', "closing '\"'")?;
                self.expect(b';', "';'")?;
                Ok(PhpValue::Str(s))
            }
            b'a' => {
                let count = self.length(b':')?;
                self.expect(b'{', "'{'")?;
                let mut entries = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    let key_pos = self.pos;
                    let key = self.value()?;
                    if !matches!(key, PhpValue::Int(_) | PhpValue::Str(_)) {
                        return Err(PhpSerError::Unexpected {
                            pos: key_pos,
                            expected: "integer or string key",
                        });
                    }
                    let value = self.value()?;
                    entries.push((key, value));
                }
                self.expect(b'}', "'}'")?;
                Ok(PhpValue::Array(entries))
            }
            other => Err(PhpSerError::UnsupportedType {
                pos: tag_pos,
                tag: other as char,
            }),
        }
    }

    fn next(&mut self) -> Result<u8, PhpSerError> {
        let b = *self.bytes.get(self.pos).ok_or(PhpSerError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(b)
    }

    fn expect(&mut self, want: u8, expected: &'static str) -> Result<(), PhpSerError> {
        let pos = self.pos;
        if self.next()? != want {
            return Err(PhpSerError::Unexpected { pos, expected });
        }
        Ok(())
    }

    /// Consumes up to and including `terminator`, returning what came before.
    fn until(&mut self, terminator: u8) -> Result<&'a str, PhpSerError> {
        let bytes = self.bytes;
        let start = self.pos;
        let offset = bytes[start..]
            .iter()
            .position(|&b| b == terminator)
            .ok_or(PhpSerError::UnexpectedEnd)?;
        self.pos = start + offset + 1;
        std::str::from_utf8(&bytes[start..start + offset]).map_err(|_| PhpSerError::Unexpected {
            pos: start,
            expected: "ASCII",
        })
    }

    fn length(&mut self, terminator: u8) -> Result<usize, PhpSerError> {
        let pos = self.pos;
        self.until(terminator)?
            .parse()
            .map_err(|_| PhpSerError::Unexpected {
                pos,
                expected: "length",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(unserialize("N;"), Ok(PhpValue::Null));
        assert_eq!(unserialize("b:1;"), Ok(PhpValue::Bool(true)));
        assert_eq!(unserialize("i:-42;"), Ok(PhpValue::Int(-42)));
        assert_eq!(unserialize("d:0.5;"), Ok(PhpValue::Float(0.5)));
        assert_eq!(
            unserialize(r#"s:5:"a;b:c";"#),
            Ok(PhpValue::Str("a;b:c".to_string()))
        );
    }

    #[test]
    fn test_string_length_is_in_bytes() {
        assert_eq!(
            unserialize("s:6:\"caf\u{e9}s\";"),
            Ok(PhpValue::Str("caf\u{e9}s".to_string()))
        );
    }

    #[test]
    fn test_array_keeps_order() {
        let value =
            unserialize(r#"a:3:{s:9:"ChangeLog";s:4:"abcd";i:7;s:4:"0f1e";s:3:"z.t";s:4:"1234";}"#)
                .unwrap();
        let PhpValue::Array(entries) = value else {
            panic!("expected array");
        };
        let keys: Vec<_> = entries
            .iter()
            .map(|(k, _)| k.as_scalar_string().unwrap())
            .collect();
        assert_eq!(keys, vec!["ChangeLog", "7", "z.t"]);
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(unserialize(""), Err(PhpSerError::UnexpectedEnd));
        assert!(unserialize(r#"s:10:"short";"#).is_err());
        assert!(unserialize(r#"a:2:{s:1:"a";s:1:"b";}"#).is_err());
        assert!(matches!(
            unserialize(r#"O:8:"stdClass":0:{}"#),
            Err(PhpSerError::UnsupportedType { tag: 'O', .. })
        ));
        assert_eq!(unserialize("N;N;"), Err(PhpSerError::TrailingData(2)));
    }
}
