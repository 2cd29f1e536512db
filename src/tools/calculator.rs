//! Built-in arithmetic evaluator.
//!
//! Handles the calculator tool without any external backend: plain infix
//! arithmetic (`2 + 2 * 3`, parentheses, `^`), a few named functions
//! (`sqrt`, `abs`, `round`), the constants `pi` and `e`, percent values
//! (`15%` is `0.15`), and natural phrasings such as "What is 15% of 1500?".
//!
//! The same tokenizer doubles as the router's arithmetic detector: a query
//! whose normalized form tokenizes cleanly and contains an operation is
//! routed to the calculator.

use crate::tools::ToolError;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    LParen,
    RParen,
    Func(Func),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Func {
    Sqrt,
    Abs,
    Round,
}

/// Phrasings stripped before tokenizing ("what is 2+2?" → "2+2").
const QUERY_PREFIXES: [&str; 6] = [
    "what is",
    "what's",
    "how much is",
    "calculate",
    "compute",
    "evaluate",
];

fn normalize(query: &str) -> String {
    let mut s = query.trim().to_lowercase();
    for prefix in QUERY_PREFIXES {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim().to_string();
            break;
        }
    }
    while s.ends_with(['?', '.', '!']) {
        s.pop();
    }
    // Word operators from spoken phrasings.
    let s = s
        .replace("multiplied by", "*")
        .replace("divided by", "/")
        .replace("to the power of", "^")
        .replace(" plus ", " + ")
        .replace(" minus ", " - ")
        .replace(" times ", " * ");
    s.trim().to_string()
}

fn tokenize(input: &str) -> Result<Vec<Token>, ToolError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | ',' => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let raw: String = chars[start..i].iter().collect();
                let value = raw
                    .parse::<f64>()
                    .map_err(|_| ToolError::Invalid(format!("bad number: {raw}")))?;
                tokens.push(Token::Number(value));
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' | '−' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' | '×' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' | '÷' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
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
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "sqrt" => tokens.push(Token::Func(Func::Sqrt)),
                    "abs" => tokens.push(Token::Func(Func::Abs)),
                    "round" => tokens.push(Token::Func(Func::Round)),
                    "pi" => tokens.push(Token::Number(std::f64::consts::PI)),
                    "e" => tokens.push(Token::Number(std::f64::consts::E)),
                    // "15% of 1500" reads as multiplication.
                    "of" => tokens.push(Token::Star),
                    other => {
                        return Err(ToolError::Invalid(format!("unknown word: {other}")));
                    }
                }
            }
            other => {
                return Err(ToolError::Invalid(format!("unexpected character: {other}")));
            }
        }
    }
    Ok(tokens)
}

/// True when the query reads as an arithmetic expression.
///
/// Used by the router's heuristics: it must reject ordinary prose ("capital
/// of France") while accepting "What is 15% of 1500?".
#[must_use]
pub fn looks_like_expression(query: &str) -> bool {
    let normalized = normalize(query);
    if normalized.is_empty() {
        return false;
    }
    let Ok(tokens) = tokenize(&normalized) else {
        return false;
    };
    let has_number = tokens.iter().any(|t| matches!(t, Token::Number(_)));
    let has_operation = tokens.iter().any(|t| {
        matches!(
            t,
            Token::Plus
                | Token::Minus
                | Token::Star
                | Token::Slash
                | Token::Caret
                | Token::Percent
                | Token::Func(_)
        )
    });
    has_number && has_operation
}

/// Evaluate a query to a number.
pub fn evaluate(query: &str) -> Result<f64, ToolError> {
    let normalized = normalize(query);
    let tokens = tokenize(&normalized)?;
    if tokens.is_empty() {
        return Err(ToolError::Invalid("empty expression".to_string()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expression(0)?;
    if parser.pos != parser.tokens.len() {
        return Err(ToolError::Invalid("trailing tokens in expression".to_string()));
    }
    if !value.is_finite() {
        return Err(ToolError::Invalid("expression is not finite".to_string()));
    }
    Ok(value)
}

/// Evaluate and render without a trailing `.0` for whole results.
pub fn answer(query: &str) -> Result<String, ToolError> {
    let value = evaluate(query)?;
    if (value - value.round()).abs() < 1e-9 && value.abs() < 1e15 {
        Ok(format!("{}", value.round() as i64))
    } else {
        Ok(format!("{value}"))
    }
}

/// Pratt parser over the token stream. Precedence climbs from addition (1)
/// through multiplication (2) to exponentiation (3, right-associative);
/// postfix `%` binds tightest.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expression(&mut self, min_bp: u8) -> Result<f64, ToolError> {
        let mut lhs = self.prefix()?;
        loop {
            let Some(op) = self.peek() else { break };
            let (bp, right_assoc) = match op {
                Token::Plus | Token::Minus => (1, false),
                Token::Star | Token::Slash => (2, false),
                Token::Caret => (3, true),
                Token::Percent => {
                    self.bump();
                    lhs /= 100.0;
                    continue;
                }
                _ => break,
            };
            if bp < min_bp {
                break;
            }
            self.bump();
            let next_bp = if right_assoc { bp } else { bp + 1 };
            let rhs = self.expression(next_bp)?;
            lhs = match op {
                Token::Plus => lhs + rhs,
                Token::Minus => lhs - rhs,
                Token::Star => lhs * rhs,
                Token::Slash => {
                    if rhs == 0.0 {
                        return Err(ToolError::Invalid("division by zero".to_string()));
                    }
                    lhs / rhs
                }
                Token::Caret => lhs.powf(rhs),
                _ => unreachable!("non-operator filtered above"),
            };
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<f64, ToolError> {
        match self.bump() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Minus) => Ok(-self.prefix()?),
            Some(Token::Plus) => self.prefix(),
            Some(Token::LParen) => {
                let value = self.expression(0)?;
                match self.bump() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(ToolError::Invalid("unbalanced parentheses".to_string())),
                }
            }
            Some(Token::Func(func)) => {
                let arg = match self.peek() {
                    Some(Token::LParen) => {
                        self.bump();
                        let value = self.expression(0)?;
                        match self.bump() {
                            Some(Token::RParen) => value,
                            _ => {
                                return Err(ToolError::Invalid(
                                    "unbalanced parentheses".to_string(),
                                ))
                            }
                        }
                    }
                    _ => self.prefix()?,
                };
                Ok(match func {
                    Func::Sqrt => arg.sqrt(),
                    Func::Abs => arg.abs(),
                    Func::Round => arg.round(),
                })
            }
            other => Err(ToolError::Invalid(format!(
                "unexpected token: {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_arithmetic() {
        assert_eq!(answer("2 + 2").unwrap(), "4");
        assert_eq!(answer("2 + 3 * 4").unwrap(), "14");
        assert_eq!(answer("(2 + 3) * 4").unwrap(), "20");
        assert_eq!(answer("10 / 4").unwrap(), "2.5");
        assert_eq!(answer("2 ^ 10").unwrap(), "1024");
    }

    #[test]
    fn percent_of_phrasing() {
        assert_eq!(answer("What is 15% of 1500?").unwrap(), "225");
        assert_eq!(answer("50% of 80").unwrap(), "40");
    }

    #[test]
    fn functions_and_constants() {
        assert_eq!(answer("sqrt(16)").unwrap(), "4");
        assert_eq!(answer("abs(-3)").unwrap(), "3");
        assert_eq!(answer("round(2.6)").unwrap(), "3");
        assert!(evaluate("2 * pi").unwrap() > 6.28);
    }

    #[test]
    fn spoken_operators() {
        assert_eq!(answer("What is 7 times 6?").unwrap(), "42");
        assert_eq!(answer("100 divided by 8").unwrap(), "12.5");
        assert_eq!(answer("2 to the power of 8").unwrap(), "256");
    }

    #[test]
    fn detector_accepts_math_and_rejects_prose() {
        assert!(looks_like_expression("What is 15% of 1500?"));
        assert!(looks_like_expression("2 + 2"));
        assert!(looks_like_expression("sqrt(81)"));
        assert!(!looks_like_expression("What is the capital of France?"));
        assert!(!looks_like_expression("Tell me about 1984"));
        assert!(!looks_like_expression(""));
    }

    #[test]
    fn division_by_zero_is_invalid() {
        assert!(matches!(evaluate("1 / 0"), Err(ToolError::Invalid(_))));
    }

    #[test]
    fn unbalanced_parens_are_invalid() {
        assert!(evaluate("(2 + 3").is_err());
    }
}
