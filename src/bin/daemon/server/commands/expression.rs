//! Restricted Arithmetic Grammar
//!
//! A small recursive-descent parser and evaluator for arithmetic expressions.
//! The syntax tree only has two node kinds, numeric literals and binary operations
//! over `+ - * / ^`, so names, calls, strings, comparisons and unary operators are
//! rejected while parsing and can never reach evaluation.
//!
//! Grammar (power is right-associative and binds tightest):
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := power (('*' | '/') power)*
//! power  := atom ('^' power)?
//! atom   := NUMBER | '(' expr ')'
//! ```

use std::fmt;

use thiserror::Error;

/// Deepest nesting of parentheses / right-associative powers accepted
pub const MAX_DEPTH: usize = 200;
/// Longest token stream accepted; bounds the height of left-associative chains
pub const MAX_TOKENS: usize = 4096;

/// Reasons an expression cannot be parsed or evaluated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedChar { found: char, position: usize },
    #[error("names are not allowed: '{name}' at position {position}")]
    NameNotAllowed { name: String, position: usize },
    #[error("string literals are not allowed at position {position}")]
    StringNotAllowed { position: usize },
    #[error("malformed number '{text}' at position {position}")]
    MalformedNumber { text: String, position: usize },
    #[error("integer literal too large: {0}")]
    IntegerTooLarge(String),
    #[error("unexpected {found} at position {position}")]
    UnexpectedToken { found: String, position: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expression nested deeper than {max} levels", max = MAX_DEPTH)]
    TooDeep,
    #[error("expression longer than {max} tokens", max = MAX_TOKENS)]
    TooLong,
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("0.0 cannot be raised to a negative power")]
    ZeroToNegativePower,
    #[error("negative number cannot be raised to a fractional power")]
    FractionalPowerOfNegative,
    #[error("numeric result out of range")]
    OutOfRange,
}

/// Binary operators of the grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        };
        f.write_str(symbol)
    }
}

/// Numeric value; integers stay integral until an operation needs a float
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(value) => value as f64,
            Number::Float(value) => value,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(value) => value == 0,
            Number::Float(value) => value == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Int(value) => write!(f, "{value}"),
            Number::Float(value) if value.is_nan() => f.write_str("nan"),
            Number::Float(value) if value.is_infinite() => write!(f, "{value}"),
            Number::Float(value)
                if value.abs() >= SCIENTIFIC_ABOVE
                    || (value != 0.0 && value.abs() < SCIENTIFIC_BELOW) =>
            {
                write_scientific(f, value)
            }
            // Integral floats keep a trailing ".0" so "4 / 2" reads "2.0"
            Number::Float(value) if value.fract() == 0.0 => write!(f, "{value:.1}"),
            Number::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Floats at or above this magnitude are rendered with an exponent
const SCIENTIFIC_ABOVE: f64 = 1e16;
/// Non-zero floats below this magnitude are rendered with an exponent
const SCIENTIFIC_BELOW: f64 = 1e-4;

/// Shortest round-trip digits with a signed, two-digit exponent: `1e+16`, `2.5e-07`
fn write_scientific(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    let shortest = format!("{value:e}");
    let (mantissa, exponent) = shortest.split_once('e').unwrap_or((shortest.as_str(), "0"));
    let exponent: i32 = exponent.parse().map_err(|_| fmt::Error)?;
    let sign = if exponent < 0 { '-' } else { '+' };
    write!(f, "{mantissa}e{sign}{:02}", exponent.unsigned_abs())
}

/// Syntax tree: the grammar is closed over these two node kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(Number),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Number),
    Op(BinaryOp),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(number) => write!(f, "number {number}"),
            Token::Op(op) => write!(f, "operator '{op}'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
        }
    }
}

/// Parse and evaluate `source` in one step
pub fn evaluate(source: &str) -> Result<Number, ExpressionError> {
    parse(source)?.eval()
}

/// Parse `source` into a syntax tree
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    let mut parser = Parser {
        tokens,
        position: 0,
        depth: 0,
    };
    let expr = parser.expr()?;
    match parser.tokens.get(parser.position) {
        None => Ok(expr),
        Some((token, position)) => Err(ExpressionError::UnexpectedToken {
            found: token.to_string(),
            position: *position,
        }),
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '0'..='9' | '.' => {
                let text = take_number(&mut chars);
                tokens.push((Token::Number(parse_number(&text, position)?), position));
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !(c.is_alphanumeric() || c == '_') {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                return Err(ExpressionError::NameNotAllowed { name, position });
            }
            '\'' | '"' => return Err(ExpressionError::StringNotAllowed { position }),
            '+' => Token::Op(BinaryOp::Add),
            '-' => Token::Op(BinaryOp::Sub),
            '*' => Token::Op(BinaryOp::Mul),
            '/' => Token::Op(BinaryOp::Div),
            '^' => Token::Op(BinaryOp::Pow),
            '(' => Token::LParen,
            ')' => Token::RParen,
            found => return Err(ExpressionError::UnexpectedChar { found, position }),
        };
        chars.next();
        tokens.push((token, position));
    }

    if tokens.len() > MAX_TOKENS {
        return Err(ExpressionError::TooLong);
    }
    Ok(tokens)
}

/// Consume `digits [. digits] [e [+-] digits]` starting at the current position
fn take_number(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> String {
    let mut text = String::new();
    let mut seen_exponent = false;

    while let Some(&(_, c)) = chars.peek() {
        match c {
            '0'..='9' | '.' => text.push(c),
            'e' | 'E' if !seen_exponent => {
                seen_exponent = true;
                text.push(c);
                chars.next();
                if let Some(&(_, sign @ ('+' | '-'))) = chars.peek() {
                    text.push(sign);
                } else {
                    continue;
                }
            }
            _ => break,
        }
        chars.next();
    }

    text
}

fn parse_number(text: &str, position: usize) -> Result<Number, ExpressionError> {
    let malformed = || ExpressionError::MalformedNumber {
        text: text.to_string(),
        position,
    };

    let is_float = text.contains(['.', 'e', 'E']);
    let has_digit = text.chars().any(|c| c.is_ascii_digit());
    if !has_digit || text.ends_with(['e', 'E', '+', '-']) {
        return Err(malformed());
    }

    if is_float {
        text.parse::<f64>().map(Number::Float).map_err(|_| malformed())
    } else {
        text.parse::<i64>()
            .map(Number::Int)
            .map_err(|_| ExpressionError::IntegerTooLarge(text.to_string()))
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(token, _)| token)
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let next = self.tokens.get(self.position).cloned();
        if next.is_some() {
            self.position += 1;
        }
        next
    }

    fn descend(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep);
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.term()?;
        while let Some(Token::Op(op @ (BinaryOp::Add | BinaryOp::Sub))) = self.peek() {
            let op = *op;
            self.advance();
            let right = self.term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.power()?;
        while let Some(Token::Op(op @ (BinaryOp::Mul | BinaryOp::Div))) = self.peek() {
            let op = *op;
            self.advance();
            let right = self.power()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.atom()?;
        if let Some(Token::Op(BinaryOp::Pow)) = self.peek() {
            self.advance();
            self.descend()?;
            let exponent = self.power()?;
            self.depth -= 1;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, ExpressionError> {
        match self.advance() {
            Some((Token::Number(number), _)) => Ok(Expr::Number(number)),
            Some((Token::LParen, _)) => {
                self.descend()?;
                let inner = self.expr()?;
                match self.advance() {
                    Some((Token::RParen, _)) => {
                        self.depth -= 1;
                        Ok(inner)
                    }
                    Some((token, position)) => Err(ExpressionError::UnexpectedToken {
                        found: token.to_string(),
                        position,
                    }),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            // Leading operators land here, which is how unary +/- are refused
            Some((token, position)) => Err(ExpressionError::UnexpectedToken {
                found: token.to_string(),
                position,
            }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

impl Expr {
    /// Evaluate the tree
    pub fn eval(&self) -> Result<Number, ExpressionError> {
        match self {
            Expr::Number(number) => Ok(*number),
            Expr::Binary { op, left, right } => apply(*op, left.eval()?, right.eval()?),
        }
    }
}

fn apply(op: BinaryOp, left: Number, right: Number) -> Result<Number, ExpressionError> {
    use Number::{Float, Int};

    match (op, left, right) {
        (BinaryOp::Add, Int(a), Int(b)) => a.checked_add(b).map(Int).ok_or(ExpressionError::Overflow),
        (BinaryOp::Sub, Int(a), Int(b)) => a.checked_sub(b).map(Int).ok_or(ExpressionError::Overflow),
        (BinaryOp::Mul, Int(a), Int(b)) => a.checked_mul(b).map(Int).ok_or(ExpressionError::Overflow),
        (BinaryOp::Add, a, b) => Ok(Float(a.as_f64() + b.as_f64())),
        (BinaryOp::Sub, a, b) => Ok(Float(a.as_f64() - b.as_f64())),
        (BinaryOp::Mul, a, b) => Ok(Float(a.as_f64() * b.as_f64())),
        (BinaryOp::Div, _, b) if b.is_zero() => Err(ExpressionError::DivisionByZero),
        (BinaryOp::Div, a, b) => Ok(Float(a.as_f64() / b.as_f64())),
        (BinaryOp::Pow, a, b) => power(a, b),
    }
}

fn power(base: Number, exponent: Number) -> Result<Number, ExpressionError> {
    if let (Number::Int(base), Number::Int(exponent)) = (base, exponent) {
        if exponent >= 0 {
            let exponent = match u32::try_from(exponent) {
                Ok(exponent) => exponent,
                // Exponents past u32 only have a finite result for these bases
                Err(_) => {
                    return match base {
                        0 | 1 => Ok(Number::Int(base)),
                        -1 if exponent % 2 == 0 => Ok(Number::Int(1)),
                        -1 => Ok(Number::Int(-1)),
                        _ => Err(ExpressionError::Overflow),
                    };
                }
            };
            return base
                .checked_pow(exponent)
                .map(Number::Int)
                .ok_or(ExpressionError::Overflow);
        }
    }

    let (base, exponent) = (base.as_f64(), exponent.as_f64());
    if base == 0.0 && exponent < 0.0 {
        return Err(ExpressionError::ZeroToNegativePower);
    }
    if base < 0.0 && exponent.fract() != 0.0 {
        return Err(ExpressionError::FractionalPowerOfNegative);
    }

    let result = base.powf(exponent);
    if !result.is_finite() && base.is_finite() && exponent.is_finite() {
        return Err(ExpressionError::OutOfRange);
    }
    Ok(Number::Float(result))
}
