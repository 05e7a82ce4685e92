use crate::error::NodeError;

/// Token set of the restricted grammar. The lexer rejects everything
/// outside it, so disallowed constructs never reach the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    True,
    False,
    Null,
    And,
    Or,
    In,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, NodeError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::EqEq);
                    i += 2;
                } else {
                    return Err(unsafe_token("assignment is not permitted"));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::NotEq);
                    i += 2;
                } else {
                    return Err(unsafe_token("unexpected '!'"));
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => match chars.get(i + 1) {
                            Some(&esc @ ('"' | '\'' | '\\')) => {
                                s.push(esc);
                                i += 2;
                            }
                            _ => return Err(unsafe_token("unsupported escape sequence")),
                        },
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                        None => return Err(unsafe_token("unterminated string literal")),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '0'..='9' | '-' => {
                let start = i;
                if c == '-' {
                    i += 1;
                    if !matches!(chars.get(i), Some('0'..='9')) {
                        return Err(unsafe_token("unexpected '-'"));
                    }
                }
                let mut is_float = false;
                while let Some(&ch) = chars.get(i) {
                    match ch {
                        '0'..='9' => i += 1,
                        // A dot is part of the number only when digits follow;
                        // otherwise it is path access on a literal (rejected
                        // later by the parser).
                        '.' if !is_float && matches!(chars.get(i + 1), Some('0'..='9')) => {
                            is_float = true;
                            i += 1;
                        }
                        _ => break,
                    }
                }
                let text: String = chars[start..i].iter().collect();
                if is_float {
                    let n = text
                        .parse::<f64>()
                        .map_err(|_| unsafe_token("malformed number"))?;
                    tokens.push(Token::Float(n));
                } else {
                    let n = text
                        .parse::<i64>()
                        .map_err(|_| unsafe_token("malformed number"))?;
                    tokens.push(Token::Int(n));
                }
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while let Some(&ch) = chars.get(i) {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "in" => Token::In,
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(unsafe_token(&format!("disallowed character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

fn unsafe_token(detail: &str) -> NodeError {
    NodeError::UnsafeExpression(detail.to_string())
}
