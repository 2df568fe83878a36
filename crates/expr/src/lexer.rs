use crate::error::{ExecError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Assign,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Ampersand,
    Pipe,
    Tilde,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("name '{name}'"),
            Self::Int(v) => format!("number {v}"),
            Self::Float(v) => format!("number {v}"),
            Self::Str(_) => "string literal".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Colon => ":",
            Self::Assign => "=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Ampersand => "&",
            Self::Pipe => "|",
            Self::Tilde => "~",
            Self::Ident(_) | Self::Int(_) | Self::Float(_) | Self::Str(_) => "",
        }
    }
}

/// A token with the byte offset where it starts.
pub type Spanned = (usize, Token);

pub fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Lexer {
        chars: source.char_indices().peekable(),
        source,
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    source: &'a str,
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Result<Option<Spanned>> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((offset, c)) = self.chars.next() else {
            return Ok(None);
        };

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            '.' if self.peek_is(|c| c.is_ascii_digit()) => self.number(offset)?,
            '.' => Token::Dot,
            ':' => Token::Colon,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '&' => Token::Ampersand,
            '|' => Token::Pipe,
            '~' => Token::Tilde,
            '=' if self.eat('=') => Token::Equal,
            '=' => Token::Assign,
            '!' if self.eat('=') => Token::NotEqual,
            '<' if self.eat('=') => Token::LessThanOrEqual,
            '<' => Token::LessThan,
            '>' if self.eat('=') => Token::GreaterThanOrEqual,
            '>' => Token::GreaterThan,
            '\'' | '"' => Token::Str(self.string(offset, c)?),
            c if c.is_ascii_digit() => self.number(offset)?,
            c if c.is_alphabetic() || c == '_' => Token::Ident(self.ident(offset)),
            other => {
                return Err(ExecError::syntax(
                    offset,
                    format!("unexpected character '{other}'"),
                ))
            }
        };
        Ok(Some((offset, token)))
    }

    fn peek_is(&mut self, pred: impl Fn(char) -> bool) -> bool {
        self.chars.peek().is_some_and(|(_, c)| pred(*c))
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn end_of(&mut self, start: usize, pred: impl Fn(char) -> bool) -> usize {
        let mut end = start;
        while let Some((idx, c)) = self.chars.next_if(|(_, c)| pred(*c)) {
            end = idx + c.len_utf8();
        }
        end
    }

    fn ident(&mut self, start: usize) -> String {
        let first_len = self.source[start..].chars().next().map_or(1, char::len_utf8);
        let end = self
            .end_of(start + first_len, |c| c.is_alphanumeric() || c == '_')
            .max(start + first_len);
        self.source[start..end].to_string()
    }

    fn number(&mut self, start: usize) -> Result<Token> {
        let end = self
            .end_of(start + 1, |c| c.is_ascii_digit() || c == '.' || c == '_')
            .max(start + 1);
        let mut end = end;
        // Exponent, e.g. 1e6 or 2.5E-3.
        if self.peek_is(|c| c == 'e' || c == 'E') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if let Some((_, sign)) = lookahead.peek().copied() {
                if sign == '+' || sign == '-' {
                    lookahead.next();
                }
            }
            if lookahead.peek().is_some_and(|(_, c)| c.is_ascii_digit()) {
                self.chars = lookahead;
                end = self.end_of(end, |c| c.is_ascii_digit());
            }
        }

        let raw: String = self.source[start..end].chars().filter(|c| *c != '_').collect();
        if !raw.contains(['.', 'e', 'E']) {
            if let Ok(value) = raw.parse::<i64>() {
                return Ok(Token::Int(value));
            }
        }
        raw.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| ExecError::syntax(start, format!("invalid number '{raw}'")))
    }

    fn string(&mut self, start: usize, quote: char) -> Result<String> {
        let mut out = String::new();
        loop {
            let Some((_, c)) = self.chars.next() else {
                return Err(ExecError::syntax(start, "unterminated string literal"));
            };
            match c {
                c if c == quote => return Ok(out),
                '\\' => {
                    let Some((_, escaped)) = self.chars.next() else {
                        return Err(ExecError::syntax(start, "unterminated string literal"));
                    };
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                c => out.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|(_, t)| t)
            .collect()
    }

    #[test]
    fn lexes_method_chain() {
        assert_eq!(
            kinds("df['revenue'].sum()"),
            vec![
                Token::Ident("df".into()),
                Token::LBracket,
                Token::Str("revenue".into()),
                Token::RBracket,
                Token::Dot,
                Token::Ident("sum".into()),
                Token::LParen,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn lexes_numbers_and_operators() {
        assert_eq!(
            kinds("x >= 1_000 == 2.5e1 != .5"),
            vec![
                Token::Ident("x".into()),
                Token::GreaterThanOrEqual,
                Token::Int(1000),
                Token::Equal,
                Token::Float(25.0),
                Token::NotEqual,
                Token::Float(0.5),
            ]
        );
    }

    #[test]
    fn string_escapes_and_quotes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\"b""#),
            vec![Token::Str("it's".into()), Token::Str("a\"b".into())]
        );
    }

    #[test]
    fn rejects_statement_separators() {
        let err = tokenize("df.head(); df").unwrap_err();
        assert_eq!(
            err,
            ExecError::Syntax {
                offset: 9,
                message: "unexpected character ';'".into()
            }
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(matches!(
            tokenize("df['a"),
            Err(ExecError::Syntax { offset: 3, .. })
        ));
    }
}
