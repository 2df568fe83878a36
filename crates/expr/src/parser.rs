//! Precedence-climbing parser for the expression language.
//!
//! Operator precedence follows Python, lowest first: `or`, `and`, `not`,
//! comparisons, `|`, `&`, `+ -`, `* / %`, unary `- + ~`, then postfix
//! attribute access, calls and indexing.

use crate::ast::{BinaryOp, Expr, IndexKey, Literal, UnaryOp};
use crate::error::{ExecError, Result};
use crate::lexer::{tokenize, Spanned, Token};

/// Operator precedence.
type Precedence = u8;

const PREC_OR: Precedence = 1;
const PREC_AND: Precedence = 2;
const PREC_NOT: Precedence = 3;
const PREC_COMPARE: Precedence = 4;
const PREC_BIT_OR: Precedence = 5;
const PREC_BIT_AND: Precedence = 6;
const PREC_ADD: Precedence = 7;
const PREC_MULTIPLY: Precedence = 8;
const PREC_PREFIX: Precedence = 9;

const MAX_DEPTH: usize = 64;

pub fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        source_len: source.len(),
    };
    if parser.tokens.is_empty() {
        return Err(ExecError::syntax(0, "expression is empty"));
    }
    let expr = parser.expression(0)?;
    match parser.peek() {
        None => Ok(expr),
        Some(Token::Assign) => Err(ExecError::syntax(
            parser.offset(),
            "assignment is not allowed",
        )),
        Some(token) => Err(ExecError::syntax(
            parser.offset(),
            format!("unexpected {}", token.describe()),
        )),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    source_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.source_len, |(offset, _)| *offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<()> {
        if self.eat(expected) {
            return Ok(());
        }
        let found = self
            .peek()
            .map_or_else(|| "end of input".to_string(), Token::describe);
        Err(ExecError::syntax(
            self.offset(),
            format!("expected {what}, found {found}"),
        ))
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExecError::syntax(self.offset(), "expression nests too deeply"));
        }
        Ok(())
    }

    fn infix(&self) -> Option<(BinaryOp, Precedence)> {
        let op = match self.peek()? {
            Token::Ident(word) if word == "or" => (BinaryOp::Or, PREC_OR),
            Token::Ident(word) if word == "and" => (BinaryOp::And, PREC_AND),
            Token::Equal => (BinaryOp::Equal, PREC_COMPARE),
            Token::NotEqual => (BinaryOp::NotEqual, PREC_COMPARE),
            Token::LessThan => (BinaryOp::LessThan, PREC_COMPARE),
            Token::LessThanOrEqual => (BinaryOp::LessThanOrEqual, PREC_COMPARE),
            Token::GreaterThan => (BinaryOp::GreaterThan, PREC_COMPARE),
            Token::GreaterThanOrEqual => (BinaryOp::GreaterThanOrEqual, PREC_COMPARE),
            Token::Pipe => (BinaryOp::Or, PREC_BIT_OR),
            Token::Ampersand => (BinaryOp::And, PREC_BIT_AND),
            Token::Plus => (BinaryOp::Add, PREC_ADD),
            Token::Minus => (BinaryOp::Subtract, PREC_ADD),
            Token::Star => (BinaryOp::Multiply, PREC_MULTIPLY),
            Token::Slash => (BinaryOp::Divide, PREC_MULTIPLY),
            Token::Percent => (BinaryOp::Remainder, PREC_MULTIPLY),
            _ => return None,
        };
        Some(op)
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn expression(&mut self, min_prec: Precedence) -> Result<Expr> {
        self.enter()?;
        let mut lhs = self.prefix()?;
        // Each link of a left-associative chain deepens the tree by one.
        let mut links = 0;
        while let Some((op, prec)) = self.infix() {
            if prec < min_prec {
                break;
            }
            self.enter()?;
            links += 1;
            self.advance();
            let rhs = self.expression(prec + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.leave(links + 1);
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr> {
        let (op, prec) = match self.peek() {
            Some(Token::Ident(word)) if word == "not" => (Some(UnaryOp::Not), PREC_NOT),
            Some(Token::Tilde) => (Some(UnaryOp::Not), PREC_PREFIX),
            Some(Token::Minus) => (Some(UnaryOp::Negate), PREC_PREFIX),
            Some(Token::Plus) => (None, PREC_PREFIX),
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.expression(prec)?;
        Ok(match op {
            Some(op) => Expr::Unary {
                op,
                operand: Box::new(operand),
            },
            None => operand,
        })
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.atom()?;
        let mut links = 0;
        loop {
            if matches!(
                self.peek(),
                Some(Token::Dot | Token::LParen | Token::LBracket)
            ) {
                self.enter()?;
                links += 1;
            }
            if self.eat(&Token::Dot) {
                let offset = self.offset();
                match self.advance() {
                    Some(Token::Ident(name)) => {
                        expr = Expr::Attribute {
                            target: Box::new(expr),
                            name,
                        }
                    }
                    _ => return Err(ExecError::syntax(offset, "expected a name after '.'")),
                }
            } else if self.eat(&Token::LParen) {
                let (args, kwargs) = self.call_arguments()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                    kwargs,
                };
            } else if self.eat(&Token::LBracket) {
                let keys = self.index_keys()?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    keys,
                };
            } else {
                self.leave(links);
                return Ok(expr);
            }
        }
    }

    fn atom(&mut self) -> Result<Expr> {
        let offset = self.offset();
        let Some(token) = self.advance() else {
            return Err(ExecError::syntax(offset, "unexpected end of input"));
        };
        let expr = match token {
            Token::Ident(name) => match name.as_str() {
                "True" => Expr::Literal(Literal::Bool(true)),
                "False" => Expr::Literal(Literal::Bool(false)),
                "None" => Expr::Literal(Literal::None),
                _ => Expr::Name(name),
            },
            Token::Int(v) => Expr::Literal(Literal::Int(v)),
            Token::Float(v) => Expr::Literal(Literal::Float(v)),
            Token::Str(v) => Expr::Literal(Literal::Str(v)),
            Token::LParen => {
                let items = self.sequence(&Token::RParen, "')'")?;
                match <[Expr; 1]>::try_from(items) {
                    Ok([single]) if !self.trailing_comma() => single,
                    Ok([single]) => Expr::List(vec![single]),
                    Err(items) => Expr::List(items),
                }
            }
            Token::LBracket => Expr::List(self.sequence(&Token::RBracket, "']'")?),
            other => {
                return Err(ExecError::syntax(
                    offset,
                    format!("unexpected {}", other.describe()),
                ))
            }
        };
        Ok(expr)
    }

    fn trailing_comma(&self) -> bool {
        self.pos >= 2 && self.tokens[self.pos - 2].1 == Token::Comma
    }

    /// Comma-separated expressions up to `close`, which is consumed.
    fn sequence(&mut self, close: &Token, what: &str) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.expression(0)?);
            if !self.eat(&Token::Comma) {
                self.expect(close, what)?;
                break;
            }
        }
        Ok(items)
    }

    fn call_arguments(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while !self.eat(&Token::RParen) {
            let keyword = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Ident(name)), Some(Token::Assign)) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = keyword {
                self.pos += 2;
                if kwargs.iter().any(|(existing, _)| *existing == name) {
                    return Err(ExecError::syntax(
                        self.offset(),
                        format!("keyword argument '{name}' repeated"),
                    ));
                }
                kwargs.push((name, self.expression(0)?));
            } else {
                if !kwargs.is_empty() {
                    return Err(ExecError::syntax(
                        self.offset(),
                        "positional argument follows keyword argument",
                    ));
                }
                args.push(self.expression(0)?);
            }
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RParen, "')'")?;
                break;
            }
        }
        Ok((args, kwargs))
    }

    fn index_keys(&mut self) -> Result<Vec<IndexKey>> {
        let mut keys = Vec::new();
        loop {
            let start = match self.peek() {
                Some(Token::Colon) => None,
                _ => Some(self.expression(0)?),
            };
            let key = if self.eat(&Token::Colon) {
                let stop = match self.peek() {
                    Some(Token::Comma | Token::RBracket) => None,
                    _ => Some(self.expression(0)?),
                };
                IndexKey::Slice { start, stop }
            } else {
                match start {
                    Some(expr) => IndexKey::Expr(expr),
                    None => return Err(ExecError::syntax(self.offset(), "empty index")),
                }
            };
            keys.push(key);
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBracket, "']'")?;
                return Ok(keys);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.to_string()))
    }

    fn column(n: &str) -> Expr {
        Expr::Index {
            target: name("df"),
            keys: vec![IndexKey::Expr(Expr::Literal(Literal::Str(n.to_string())))],
        }
    }

    #[test]
    fn parses_column_aggregate() {
        assert_eq!(
            parse("df['revenue'].sum()").unwrap(),
            Expr::Call {
                func: Box::new(Expr::Attribute {
                    target: Box::new(column("revenue")),
                    name: "sum".into(),
                }),
                args: vec![],
                kwargs: vec![],
            }
        );
    }

    #[test]
    fn bitwise_and_binds_tighter_than_comparison() {
        // Python parses `a > 1 & b` as `a > (1 & b)`.
        let Expr::Binary { op, rhs, .. } = parse("a > 1 & b").unwrap() else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinaryOp::GreaterThan);
        assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn parenthesised_masks_combine() {
        let Expr::Index { keys, .. } = parse("df[(df['a'] > 1) & (df['b'] == 'x')]").unwrap()
        else {
            panic!("expected index expression");
        };
        assert!(matches!(
            &keys[0],
            IndexKey::Expr(Expr::Binary {
                op: BinaryOp::And,
                ..
            })
        ));
    }

    #[test]
    fn keyword_arguments_and_lists() {
        let Expr::Call { args, kwargs, .. } =
            parse("df.sort_values(['a', 'b'], ascending=False)").unwrap()
        else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        assert!(matches!(&args[0], Expr::List(items) if items.len() == 2));
        assert_eq!(kwargs[0].0, "ascending");
        assert_eq!(kwargs[0].1, Expr::Literal(Literal::Bool(false)));
    }

    #[test]
    fn slices_and_multi_keys() {
        let Expr::Index { keys, .. } = parse("df.loc[:, 'a']").unwrap() else {
            panic!("expected index");
        };
        assert_eq!(keys.len(), 2);
        assert_eq!(
            keys[0],
            IndexKey::Slice {
                start: None,
                stop: None
            }
        );

        let Expr::Index { keys, .. } = parse("df.iloc[1:3]").unwrap() else {
            panic!("expected index");
        };
        assert!(matches!(
            &keys[0],
            IndexKey::Slice {
                start: Some(_),
                stop: Some(_)
            }
        ));
    }

    #[test]
    fn rejects_assignment() {
        let err = parse("x = df['a'].sum()").unwrap_err();
        assert_eq!(
            err,
            ExecError::Syntax {
                offset: 2,
                message: "assignment is not allowed".into()
            }
        );
    }

    #[test]
    fn rejects_trailing_tokens_and_empty_input() {
        assert!(parse("df df").is_err());
        assert!(parse("   ").is_err());
        assert!(parse("df[").is_err());
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let source = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        let err = parse(&source).unwrap_err();
        assert!(err.to_string().contains("nests too deeply"), "{err}");
    }

    #[test]
    fn long_operator_chains_are_bounded() {
        let source = format!("1{}", "+1".repeat(100_000));
        let err = parse(&source).unwrap_err();
        assert!(matches!(err, ExecError::Syntax { .. }), "{err}");
        assert!(err.to_string().contains("nests too deeply"), "{err}");
    }

    #[test]
    fn long_method_chains_are_bounded() {
        let source = format!("df['a']{}.sum()", ".abs()".repeat(3_000));
        let err = parse(&source).unwrap_err();
        assert!(matches!(err, ExecError::Syntax { .. }), "{err}");

        let source = format!("df{}", "['a']".repeat(10_000));
        assert!(matches!(parse(&source), Err(ExecError::Syntax { .. })));
    }

    #[test]
    fn short_chains_still_parse() {
        parse(&format!("1{}", "+1".repeat(20))).unwrap();
        parse("df['a'].abs().abs().round(2).sum()").unwrap();
        parse("df[(df['a'] > 1) & (df['b'] == 'x')]['c'].sort_values().head(3).tolist()")
            .unwrap();
    }
}
