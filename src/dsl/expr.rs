use super::codegen::CodeGen;
use super::error::CompileError;
use super::instruction::{Instruction, Operator, Register, Slot, Value};
use super::lexer::Span;
use super::symbols::CallContext;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Register(Register),
    Var(String),
    Unary(Operator, Box<Expr>),
    Binary(Operator, Box<Expr>, Box<Expr>),
}

/// Compile the text of a braced expression. The generated code leaves the
/// expression's value on the eval stack.
pub fn compile_expression(
    text: &str,
    span: Span,
    context: &CallContext,
    code: &mut CodeGen,
) -> Result<(), CompileError> {
    let tokens = tokenize(text).map_err(|msg| CompileError::parser(msg, span))?;
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        span,
        context,
    };
    let expr = parser.or_expr()?;
    if let Some(tok) = parser.peek() {
        return Err(CompileError::parser(
            format!("Unexpected {tok:?} in expression"),
            span,
        ));
    }
    generate(&expr, code);
    Ok(())
}

fn tokenize(text: &str) -> Result<Vec<Tok>, String> {
    const TWO_CHAR: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];
    const ONE_CHAR: [&str; 8] = ["+", "-", "*", "/", "%", "<", ">", "!"];

    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(i, c)) = chars.peek() {
        let rest = text.get(i..).unwrap_or_default();
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || (c == '.' && rest.chars().nth(1).is_some_and(|d| d.is_ascii_digit())) {
            let len = rest
                .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
                .unwrap_or(rest.len());
            let literal = rest.get(..len).unwrap_or_default();
            let n = literal
                .parse::<f64>()
                .map_err(|_| format!("Invalid number in expression: {literal}"))?;
            tokens.push(Tok::Num(n));
            for _ in 0..len {
                chars.next();
            }
        } else if c.is_ascii_alphabetic() || c == '_' {
            let len = rest
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                .unwrap_or(rest.len());
            tokens.push(Tok::Ident(rest.get(..len).unwrap_or_default().to_string()));
            for _ in 0..len {
                chars.next();
            }
        } else if c == '"' {
            chars.next();
            let body: String = chars.by_ref().map(|(_, ch)| ch).take_while(|ch| *ch != '"').collect();
            if !rest.get(1..).is_some_and(|r| r.contains('"')) {
                return Err("Unterminated string in expression".to_string());
            }
            tokens.push(Tok::Str(body));
        } else if c == '(' || c == ')' {
            tokens.push(if c == '(' { Tok::LParen } else { Tok::RParen });
            chars.next();
        } else if let Some(op) = TWO_CHAR.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(Tok::Op(*op));
            chars.next();
            chars.next();
        } else if let Some(op) = ONE_CHAR.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(Tok::Op(*op));
            chars.next();
        } else {
            return Err(format!("Unexpected character '{c}' in expression"));
        }
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: Vec<Tok>,
    pos: usize,
    span: Span,
    context: &'a CallContext,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::parser(message, self.span)
    }

    /// Consume the next token if it is one of the given operator spellings.
    fn eat_op(&mut self, spellings: &[&str]) -> bool {
        let hit = match self.peek() {
            Some(Tok::Op(op)) => spellings.contains(op),
            Some(Tok::Ident(word)) => spellings.contains(&word.as_str()),
            _ => false,
        };
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn or_expr(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.and_expr()?;
        while self.eat_op(&["or", "||"]) {
            let right = self.and_expr()?;
            left = Expr::Binary(Operator::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.not_expr()?;
        while self.eat_op(&["and", "&&"]) {
            let right = self.not_expr()?;
            left = Expr::Binary(Operator::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, CompileError> {
        if self.eat_op(&["not", "!"]) {
            let operand = self.not_expr()?;
            return Ok(Expr::Unary(Operator::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Op("==")) => Operator::Eq,
                Some(Tok::Op("!=")) => Operator::NotEq,
                Some(Tok::Op("<")) => Operator::Lt,
                Some(Tok::Op("<=")) => Operator::LtEq,
                Some(Tok::Op(">")) => Operator::Gt,
                Some(Tok::Op(">=")) => Operator::GtEq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Op("+")) => Operator::Add,
                Some(Tok::Op("-")) => Operator::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Op("*")) => Operator::Mul,
                Some(Tok::Op("/")) => Operator::Div,
                Some(Tok::Op("%")) => Operator::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        match self.peek() {
            Some(Tok::Op("-")) => {
                self.pos += 1;
                let operand = self.unary()?;
                Ok(match operand {
                    Expr::Literal(Value::Number(n)) => Expr::Literal(Value::Number(-n)),
                    other => Expr::Unary(Operator::Neg, Box::new(other)),
                })
            }
            Some(Tok::Op("+")) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<Expr, CompileError> {
        match self.advance() {
            Some(Tok::Num(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Tok::Ident(word)) => match word.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                _ => {
                    if let Some(reg) = Register::from_word(&word) {
                        Ok(Expr::Register(reg))
                    } else if self.context.is_data(&word) {
                        Ok(Expr::Var(word))
                    } else {
                        Err(CompileError::semantic(
                            format!("Not a data variable: \"{word}\""),
                            self.span,
                        ))
                    }
                }
            },
            Some(Tok::LParen) => {
                let inner = self.or_expr()?;
                match self.advance() {
                    Some(Tok::RParen) => Ok(inner),
                    _ => Err(self.error("Expected ')' in expression")),
                }
            }
            Some(tok) => Err(self.error(format!("Unexpected {tok:?} in expression"))),
            None => Err(self.error("Incomplete expression")),
        }
    }
}

/// Emit postfix code. `and`/`or` skip their right operand when the left one
/// decides the result.
fn generate(expr: &Expr, code: &mut CodeGen) {
    match expr {
        Expr::Literal(value) => code.push(value.clone()),
        Expr::Register(reg) => code.push(*reg),
        Expr::Var(name) => code.push(Slot::var(name)),
        Expr::Unary(op, operand) => {
            generate(operand, code);
            code.add_instruction(Instruction::Op(*op));
        }
        Expr::Binary(Operator::And, left, right) => {
            generate(left, code);
            code.pop(Register::Result);
            let marker = code.if_true_start();
            generate(right, code);
            let marker = code.if_else(marker);
            code.push(false);
            code.if_end(marker);
        }
        Expr::Binary(Operator::Or, left, right) => {
            generate(left, code);
            code.pop(Register::Result);
            let marker = code.if_true_start();
            code.push(true);
            let marker = code.if_else(marker);
            generate(right, code);
            code.if_end(marker);
        }
        Expr::Binary(op, left, right) => {
            generate(left, code);
            generate(right, code);
            code.add_instruction(Instruction::Op(*op));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::symbols::SymbolKind;

    fn compile(text: &str, context: &CallContext) -> Result<Vec<Instruction>, CompileError> {
        let mut code = CodeGen::new();
        compile_expression(text, Span::default(), context, &mut code)?;
        Ok(code.into_instructions())
    }

    #[test]
    fn precedence_is_postfix() {
        let mut ctx = CallContext::new();
        ctx.add_variable("x", SymbolKind::Variable);
        let code = compile("x + 2 * hue", &ctx).unwrap();
        assert_eq!(code, vec![
            Instruction::Push(Slot::var("x")),
            Instruction::PushQ(Value::Number(2.0)),
            Instruction::Push(Register::Hue.into()),
            Instruction::Op(Operator::Mul),
            Instruction::Op(Operator::Add),
        ]);
    }

    #[test]
    fn parentheses_and_unary_minus() {
        let ctx = CallContext::new();
        let code = compile("-(1 - 3) % 4", &ctx).unwrap();
        assert_eq!(code, vec![
            Instruction::PushQ(Value::Number(1.0)),
            Instruction::PushQ(Value::Number(3.0)),
            Instruction::Op(Operator::Sub),
            Instruction::Op(Operator::Neg),
            Instruction::PushQ(Value::Number(4.0)),
            Instruction::Op(Operator::Mod),
        ]);
        assert_eq!(compile("-2.5", &ctx).unwrap(), vec![Instruction::PushQ(Value::Number(-2.5))]);
    }

    #[test]
    fn logical_operators_short_circuit() {
        let ctx = CallContext::new();
        let code = compile("1 < 2 and not 0", &ctx).unwrap();
        assert!(code.iter().any(|i| matches!(i, Instruction::Jump { .. })));
        assert!(code.contains(&Instruction::Op(Operator::Not)));
        assert!(!code.contains(&Instruction::Op(Operator::And)));
        let symbolic = compile("1 < 2 && !0", &ctx).unwrap();
        assert_eq!(code, symbolic);
    }

    #[test]
    fn unknown_name_is_not_data() {
        let ctx = CallContext::new();
        let err = compile("y * 2", &ctx).unwrap_err();
        assert_eq!(err.message, "Not a data variable: \"y\"");
    }

    #[test]
    fn malformed_expressions() {
        let ctx = CallContext::new();
        assert!(compile("(1 + 2", &ctx).is_err());
        assert!(compile("1 +", &ctx).is_err());
        assert!(compile("1 2", &ctx).is_err());
        assert!(compile("3 $ 4", &ctx).is_err());
    }
}
