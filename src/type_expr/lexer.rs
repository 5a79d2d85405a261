//! Tokenizer for docblock type expressions.
//!
//! Identifiers are permissive: they may contain `-` (for `non-empty-string`)
//! and `\` (for qualified class names).  Whitespace is insignificant except
//! that it separates tokens.

use super::compiler::TypeSyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Variable(String),
    Int(i64),
    Float(String),
    Str(String),
    Pipe,
    Amp,
    Lt,
    Gt,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    DoubleColon,
    Question,
    Ellipsis,
    Eq,
    Star,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, TypeSyntaxError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let single = match c {
            b'|' => Some(Token::Pipe),
            b'&' => Some(Token::Amp),
            b'<' => Some(Token::Lt),
            b'>' => Some(Token::Gt),
            b',' => Some(Token::Comma),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'{' => Some(Token::LBrace),
            b'}' => Some(Token::RBrace),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b'?' => Some(Token::Question),
            b'=' => Some(Token::Eq),
            b'*' => Some(Token::Star),
            _ => None,
        };
        if let Some(token) = single {
            out.push(Spanned {
                token,
                offset: start,
            });
            i += 1;
            continue;
        }

        match c {
            b':' => {
                if bytes.get(i + 1) == Some(&b':') {
                    out.push(Spanned {
                        token: Token::DoubleColon,
                        offset: start,
                    });
                    i += 2;
                } else {
                    out.push(Spanned {
                        token: Token::Colon,
                        offset: start,
                    });
                    i += 1;
                }
            }
            b'.' => {
                if bytes[i..].starts_with(b"...") {
                    out.push(Spanned {
                        token: Token::Ellipsis,
                        offset: start,
                    });
                    i += 3;
                } else if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                    let (token, end) = lex_number(src, i)?;
                    out.push(Spanned {
                        token,
                        offset: start,
                    });
                    i = end;
                } else {
                    return Err(TypeSyntaxError::new("unexpected `.`", start));
                }
            }
            b'$' => {
                i += 1;
                while i < bytes.len() && is_ident_byte(bytes[i]) && bytes[i] != b'\\' {
                    i += 1;
                }
                if i == start + 1 {
                    return Err(TypeSyntaxError::new("expected variable name after `$`", start));
                }
                out.push(Spanned {
                    token: Token::Variable(src[start + 1..i].to_string()),
                    offset: start,
                });
            }
            b'\'' | b'"' => {
                let (value, end) = lex_string(src, i)?;
                out.push(Spanned {
                    token: Token::Str(value),
                    offset: start,
                });
                i = end;
            }
            b'-' if bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit() || *b == b'.') => {
                let (token, end) = lex_number(src, i)?;
                out.push(Spanned {
                    token,
                    offset: start,
                });
                i = end;
            }
            b'0'..=b'9' => {
                let (token, end) = lex_number(src, i)?;
                out.push(Spanned {
                    token,
                    offset: start,
                });
                i = end;
            }
            c if is_ident_start(c) => {
                i += 1;
                while i < bytes.len() && is_ident_byte(bytes[i]) {
                    i += 1;
                }
                // No type name ends in `-`.
                let mut end = i;
                while end > start + 1 && bytes[end - 1] == b'-' {
                    end -= 1;
                }
                i = end;
                out.push(Spanned {
                    token: Token::Ident(src[start..end].to_string()),
                    offset: start,
                });
            }
            _ => {
                let ch = src[i..].chars().next().unwrap_or('?');
                return Err(TypeSyntaxError::new(
                    format!("unexpected character `{ch}`"),
                    start,
                ));
            }
        }
    }

    Ok(out)
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'\\' || c >= 0x80
}

fn is_ident_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'\\' || c == b'-' || c >= 0x80
}

fn lex_number(src: &str, start: usize) -> Result<(Token, usize), TypeSyntaxError> {
    let bytes = src.as_bytes();
    let mut i = start;
    let negative = bytes[i] == b'-';
    if negative {
        i += 1;
    }

    if bytes[i..].starts_with(b"0x") || bytes[i..].starts_with(b"0X") {
        let digits_start = i + 2;
        let mut j = digits_start;
        while j < bytes.len() && (bytes[j].is_ascii_hexdigit() || bytes[j] == b'_') {
            j += 1;
        }
        let digits: String = src[digits_start..j].chars().filter(|c| *c != '_').collect();
        let value = i64::from_str_radix(&digits, 16)
            .map_err(|_| TypeSyntaxError::new("invalid hexadecimal literal", start))?;
        return Ok((Token::Int(if negative { -value } else { value }), j));
    }

    let mut j = i;
    let mut is_float = false;
    while j < bytes.len() {
        match bytes[j] {
            b'0'..=b'9' | b'_' => j += 1,
            b'.' if !is_float && !bytes[j..].starts_with(b"...") => {
                is_float = true;
                j += 1;
            }
            b'e' | b'E' if j > i => {
                is_float = true;
                j += 1;
                if j < bytes.len() && (bytes[j] == b'-' || bytes[j] == b'+') {
                    j += 1;
                }
            }
            _ => break,
        }
    }

    let text: String = src[start..j].chars().filter(|c| *c != '_').collect();
    if is_float {
        text.parse::<f64>()
            .map_err(|_| TypeSyntaxError::new("invalid float literal", start))?;
        Ok((Token::Float(text), j))
    } else {
        let value = text
            .parse::<i64>()
            .map_err(|_| TypeSyntaxError::new("integer literal out of range", start))?;
        Ok((Token::Int(value), j))
    }
}

fn lex_string(src: &str, start: usize) -> Result<(String, usize), TypeSyntaxError> {
    let quote = src.as_bytes()[start];
    let mut value = String::new();
    let mut chars = src[start + 1..].char_indices();
    while let Some((idx, c)) = chars.next() {
        let abs = start + 1 + idx;
        if c == '\\' {
            match chars.next() {
                Some((_, escaped)) if escaped as u32 == quote as u32 || escaped == '\\' => {
                    value.push(escaped);
                }
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => break,
            }
        } else if c as u32 == quote as u32 {
            return Ok((value, abs + 1));
        } else {
            value.push(c);
        }
    }
    Err(TypeSyntaxError::new("unterminated string literal", start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn lexes_hyphenated_keywords_and_qualified_names() {
        assert_eq!(
            kinds("non-empty-string|\\Foo\\Bar"),
            vec![
                Token::Ident("non-empty-string".into()),
                Token::Pipe,
                Token::Ident("\\Foo\\Bar".into()),
            ]
        );
    }

    #[test]
    fn lexes_conditional_pieces() {
        assert_eq!(
            kinds("($field is X::FIELD_* ? int : false)"),
            vec![
                Token::LParen,
                Token::Variable("field".into()),
                Token::Ident("is".into()),
                Token::Ident("X".into()),
                Token::DoubleColon,
                Token::Ident("FIELD_".into()),
                Token::Star,
                Token::Question,
                Token::Ident("int".into()),
                Token::Colon,
                Token::Ident("false".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn lexes_numbers() {
        assert_eq!(
            kinds("-1 0x1F 1.5 ..."),
            vec![
                Token::Int(-1),
                Token::Int(31),
                Token::Float("1.5".into()),
                Token::Ellipsis,
            ]
        );
    }

    #[test]
    fn lexes_quoted_strings_with_escapes() {
        assert_eq!(kinds(r"'it\'s'"), vec![Token::Str("it's".into())]);
        assert_eq!(kinds("\"a\""), vec![Token::Str("a".into())]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("'abc").unwrap_err();
        assert_eq!(err.offset, 0);
    }
}
