use indexmap::IndexMap;

use super::codegen::{CodeGen, JumpMarker};
use super::error::CompileError;
use super::expr::compile_expression;
use super::instruction::{
    Instruction, IoOp, Operand, Program, Register, Routine, Slot, Value,
};
use super::lexer::{Span, SpannedToken, Token};
use super::loops;
use super::symbols::{CallContext, SymbolKind};
use crate::model::{TimePattern, UnitMode};

static EOF: Token = Token::Eof;

/// Parse a token stream into a program, collecting every error found.
pub fn parse(tokens: Vec<SpannedToken>) -> Result<Program, Vec<CompileError>> {
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

pub(super) struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    errors: Vec<CompileError>,
    pub(super) code: CodeGen,
    pub(super) context: CallContext,
    routines: IndexMap<String, Routine>,
    /// Pending `break` jumps, one list per enclosing loop.
    pub(super) breaks: Vec<Vec<JumpMarker>>,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            code: CodeGen::new(),
            context: CallContext::new(),
            routines: IndexMap::new(),
            breaks: Vec::new(),
        }
    }

    fn parse_program(&mut self) -> Result<Program, Vec<CompileError>> {
        while !self.at(&Token::Eof) {
            if let Err(err) = self.statement() {
                self.errors.push(err);
                self.recover();
            }
        }
        if self.errors.is_empty() {
            Ok(Program {
                instructions: std::mem::take(&mut self.code).into_instructions(),
                routines: std::mem::take(&mut self.routines),
            })
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    /// Skip ahead to something that can start a statement.
    fn recover(&mut self) {
        self.breaks.clear();
        self.context.exit_routine();
        self.advance();
        while !self.at(&Token::Eof) && !self.at_statement_start() {
            self.advance();
        }
    }

    fn at_statement_start(&self) -> bool {
        match self.peek() {
            Token::Register(_)
            | Token::Set
            | Token::On
            | Token::Off
            | Token::Get
            | Token::Wait
            | Token::Units
            | Token::Define
            | Token::Assign
            | Token::If
            | Token::Repeat
            | Token::Break
            | Token::Begin
            | Token::Print
            | Token::Println
            | Token::Printf => true,
            Token::Name(name) => self.context.is_routine(name),
            _ => false,
        }
    }

    // ── Token helpers ───────────────────────────────────────────────

    pub(super) fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&EOF, |t| &t.token)
    }

    pub(super) fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or_else(Span::default, |t| t.span)
    }

    pub(super) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(super) fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    pub(super) fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn expect(&mut self, token: &Token, what: &str) -> Result<(), CompileError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    pub(super) fn expect_name(&mut self, what: &str) -> Result<String, CompileError> {
        match self.peek() {
            Token::Name(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    pub(super) fn unexpected(&self, expected: &str) -> CompileError {
        CompileError::parser(
            format!("Expected {expected}, found {}", self.peek().describe()),
            self.span(),
        )
    }

    /// Run `f` against a fresh code buffer and hand back what it generated.
    pub(super) fn capture(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), CompileError>,
    ) -> Result<CodeGen, CompileError> {
        let outer = std::mem::take(&mut self.code);
        let result = f(self);
        let inner = std::mem::replace(&mut self.code, outer);
        result.map(|()| inner)
    }

    // ── Values ──────────────────────────────────────────────────────

    /// True when the next token can be taken as an optional value. Registers
    /// are excluded, since a register word there starts the next statement.
    pub(super) fn at_rvalue(&self) -> bool {
        match self.peek() {
            Token::Number(_) | Token::String(_) | Token::Expression(_) => true,
            Token::Name(name) => self.context.is_data(name),
            _ => false,
        }
    }

    /// Compile a value into `dest`.
    pub(super) fn rvalue(&mut self, dest: impl Into<Slot>) -> Result<(), CompileError> {
        let dest = dest.into();
        let span = self.span();
        match self.peek().clone() {
            Token::Number(n) => self.code.move_to(n, dest),
            Token::String(s) => self.code.move_to(Value::Str(s), dest),
            Token::Register(reg) => self.code.move_to(reg, dest),
            Token::Expression(text) => {
                compile_expression(&text, span, &self.context, &mut self.code)?;
                self.code.pop(dest);
            }
            Token::Name(name) => {
                if !self.context.is_data(&name) {
                    return Err(CompileError::semantic(
                        format!("Not a data variable: \"{name}\""),
                        span,
                    ));
                }
                self.code.move_to(Slot::Var(name), dest);
            }
            _ => return Err(self.unexpected("a value")),
        }
        self.advance();
        Ok(())
    }

    // ── Statements ──────────────────────────────────────────────────

    pub(super) fn statement(&mut self) -> Result<(), CompileError> {
        let span = self.span();
        match self.peek().clone() {
            Token::Register(reg) => {
                self.advance();
                self.register_setter(reg)
            }
            Token::Set => {
                self.advance();
                self.target_list(&Instruction::Color)
            }
            Token::On => {
                self.advance();
                self.target_list(&Instruction::Power(true))
            }
            Token::Off => {
                self.advance();
                self.target_list(&Instruction::Power(false))
            }
            Token::Get => {
                self.advance();
                self.target()?;
                self.code.add_instruction(Instruction::GetColor);
                Ok(())
            }
            Token::Wait => {
                self.advance();
                self.code.add_instruction(Instruction::Wait);
                Ok(())
            }
            Token::Units => {
                self.advance();
                self.units()
            }
            Token::Define => {
                self.advance();
                self.define()
            }
            Token::Assign => {
                self.advance();
                self.assign()
            }
            Token::If => {
                self.advance();
                self.if_statement()
            }
            Token::Repeat => {
                self.advance();
                loops::repeat(self)
            }
            Token::Break => {
                self.advance();
                let marker = self.code.jump_forward();
                match self.breaks.last_mut() {
                    Some(pending) => {
                        pending.push(marker);
                        Ok(())
                    }
                    None => Err(CompileError::parser("break outside of a loop", span)),
                }
            }
            Token::Begin => {
                self.advance();
                self.block(span)
            }
            Token::Print => {
                self.advance();
                self.print(IoOp::Print)
            }
            Token::Println => {
                self.advance();
                self.print(IoOp::Println)
            }
            Token::Printf => {
                self.advance();
                self.printf()
            }
            Token::Name(name) if self.context.is_routine(&name) => {
                self.advance();
                self.call(&name)
            }
            Token::Name(name) => Err(CompileError::semantic(
                format!("Unknown name: \"{name}\""),
                span,
            )),
            Token::Unknown(text) => Err(CompileError::parser(
                format!("Unexpected character: '{text}'"),
                span,
            )),
            other => Err(CompileError::parser(
                format!("Unexpected {}", other.describe()),
                span,
            )),
        }
    }

    fn block(&mut self, begin: Span) -> Result<(), CompileError> {
        while !self.eat(&Token::End) {
            if self.at(&Token::Eof) {
                return Err(CompileError::parser("Missing end for begin", begin));
            }
            self.statement()?;
        }
        Ok(())
    }

    fn register_setter(&mut self, reg: Register) -> Result<(), CompileError> {
        if reg == Register::Time && self.eat(&Token::At) {
            let mut patterns = Vec::new();
            loop {
                let span = self.span();
                let Token::TimePattern(text) = self.peek().clone() else {
                    return Err(self.unexpected("a time pattern"));
                };
                self.advance();
                let pattern =
                    TimePattern::parse(&text).map_err(|msg| CompileError::parser(msg, span))?;
                patterns.push(pattern);
                if !self.eat(&Token::Or) {
                    break;
                }
            }
            self.code.move_to(Value::At(patterns), reg);
            return Ok(());
        }
        if matches!(self.peek(), Token::String(_)) {
            return Err(CompileError::semantic(
                format!("{} needs a number, not a string", reg.name()),
                self.span(),
            ));
        }
        self.rvalue(reg)
    }

    fn units(&mut self) -> Result<(), CompileError> {
        let mode = match self.peek() {
            Token::Raw => UnitMode::Raw,
            Token::Logical => UnitMode::Logical,
            _ => return Err(self.unexpected("raw or logical")),
        };
        self.advance();
        self.code.move_to(mode, Register::UnitMode);
        Ok(())
    }

    /// One or more targets joined by `and`, each followed by `action`.
    fn target_list(&mut self, action: &Instruction) -> Result<(), CompileError> {
        loop {
            self.target()?;
            self.code.add_instruction(action.clone());
            if !self.eat(&Token::And) {
                return Ok(());
            }
        }
    }

    /// Load NAME, OPERAND and the zone registers for one target.
    fn target(&mut self) -> Result<(), CompileError> {
        match self.peek() {
            Token::All => {
                self.advance();
                self.code.move_to(Operand::All, Register::Operand);
            }
            Token::Group | Token::Location => {
                let operand = if self.advance() == Token::Group {
                    Operand::Group
                } else {
                    Operand::Location
                };
                self.rvalue(Register::Name)?;
                self.code.move_to(operand, Register::Operand);
            }
            _ => {
                self.rvalue(Register::Name)?;
                if self.eat(&Token::Zone) {
                    self.rvalue(Register::FirstZone)?;
                    if self.at_rvalue() {
                        self.rvalue(Register::LastZone)?;
                    } else {
                        self.code.move_to(Value::NULL, Register::LastZone);
                    }
                    self.code.move_to(Operand::MzLight, Register::Operand);
                } else if matches!(self.peek(), Token::Row | Token::Column | Token::Top) {
                    self.matrix_cells()?;
                } else {
                    self.code.move_to(Operand::Light, Register::Operand);
                }
            }
        }
        Ok(())
    }

    /// `row a [b]`, `column a [b]` and `top`, in any order. Unnamed bounds
    /// are cleared so the light fills them in.
    fn matrix_cells(&mut self) -> Result<(), CompileError> {
        for reg in [
            Register::FirstRow,
            Register::LastRow,
            Register::FirstColumn,
            Register::LastColumn,
        ] {
            self.code.move_to(Value::NULL, reg);
        }
        let mut top = false;
        loop {
            let (first, last) = match self.peek() {
                Token::Row => (Register::FirstRow, Register::LastRow),
                Token::Column => (Register::FirstColumn, Register::LastColumn),
                Token::Top => {
                    self.advance();
                    top = true;
                    continue;
                }
                _ => break,
            };
            self.advance();
            self.rvalue(first)?;
            if self.at_rvalue() {
                self.rvalue(last)?;
            } else {
                self.code.move_to(Value::NULL, last);
            }
        }
        let operand = if top { Operand::MatrixTop } else { Operand::Matrix };
        self.code.move_to(operand, Register::Operand);
        Ok(())
    }

    fn assign(&mut self) -> Result<(), CompileError> {
        let span = self.span();
        let name = self.expect_name("a variable name after assign")?;
        match self.context.resolve(&name) {
            Some(SymbolKind::Constant) => {
                return Err(CompileError::semantic(
                    format!("Cannot assign to constant \"{name}\""),
                    span,
                ));
            }
            _ if self.context.is_routine(&name) => {
                return Err(CompileError::semantic(
                    format!("\"{name}\" is a routine"),
                    span,
                ));
            }
            _ => {}
        }
        self.rvalue(Slot::var(&name))?;
        self.context.add_variable(&name, SymbolKind::Variable);
        Ok(())
    }

    /// `define name value` declares a constant; anything else after the name
    /// is a routine definition.
    fn define(&mut self) -> Result<(), CompileError> {
        let span = self.span();
        let name = self.expect_name("a name after define")?;
        if !self.context.is_free(&name) {
            return Err(CompileError::semantic(
                format!("\"{name}\" is already defined"),
                span,
            ));
        }
        if self.at_rvalue() {
            self.rvalue(Slot::var(&name))?;
            self.context.add_variable(&name, SymbolKind::Constant);
            return Ok(());
        }
        if self.context.in_routine() {
            return Err(CompileError::parser("Routines cannot be nested", span));
        }

        let params = self.routine_params()?;
        self.context.add_routine(&name, params.clone());

        let skip = self.code.jump_forward();
        let entry = self.code.current_offset();
        let outer_breaks = std::mem::take(&mut self.breaks);
        self.context.enter_routine(&params);
        let body = self.statement();
        self.context.exit_routine();
        self.breaks = outer_breaks;
        body?;
        self.code.add_instruction(Instruction::EndRoutine);
        self.code.resolve(skip);

        self.routines.insert(
            name.clone(),
            Routine {
                name,
                params,
                entry,
            },
        );
        Ok(())
    }

    /// `with p1 [and] p2 ...`; a routine name ends the list.
    fn routine_params(&mut self) -> Result<Vec<String>, CompileError> {
        let mut params: Vec<String> = Vec::new();
        if !self.eat(&Token::With) {
            return Ok(params);
        }
        loop {
            match self.peek() {
                Token::Name(p) if !self.context.is_routine(p) && !params.contains(p) => {
                    params.push(p.clone());
                    self.advance();
                }
                Token::And if !params.is_empty() => {
                    self.advance();
                }
                _ => break,
            }
        }
        if params.is_empty() {
            return Err(self.unexpected("a parameter name after with"));
        }
        Ok(params)
    }

    fn call(&mut self, name: &str) -> Result<(), CompileError> {
        let params = self
            .context
            .routine_params(name)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        for (i, param) in params.into_iter().enumerate() {
            if i > 0 {
                self.eat(&Token::And);
            }
            self.rvalue(Register::Result)?;
            self.code.add_instruction(Instruction::BindArg {
                name: param,
                src: Register::Result.into(),
            });
        }
        self.code.add_instruction(Instruction::Jsr(name.to_string()));
        Ok(())
    }

    fn if_statement(&mut self) -> Result<(), CompileError> {
        self.rvalue(Register::Result)?;
        let marker = self.code.if_true_start();
        self.statement()?;
        if self.eat(&Token::Else) {
            let marker = self.code.if_else(marker);
            self.statement()?;
            self.code.if_end(marker);
        } else {
            self.code.if_end(marker);
        }
        Ok(())
    }

    fn print(&mut self, op: IoOp) -> Result<(), CompileError> {
        self.rvalue(Register::Result)?;
        self.code
            .add_instruction(Instruction::Out(IoOp::Register(Register::Result.into())));
        self.code.add_instruction(Instruction::Out(op));
        Ok(())
    }

    /// `printf "fmt" args...`: one argument per `{}`; `{name}` fields are
    /// looked up when the line is printed.
    fn printf(&mut self) -> Result<(), CompileError> {
        let span = self.span();
        let Token::String(format) = self.peek().clone() else {
            return Err(self.unexpected("a format string after printf"));
        };
        self.advance();

        let mut positional = 0;
        for field in placeholders(&format) {
            if field.is_empty() {
                positional += 1;
            } else if Register::from_word(field).is_none() && !self.context.is_data(field) {
                return Err(CompileError::semantic(
                    format!("Not a data variable: \"{field}\""),
                    span,
                ));
            }
        }
        for _ in 0..positional {
            let slot = if let Token::Register(reg) = self.peek() {
                let slot = Slot::Register(*reg);
                self.advance();
                slot
            } else {
                self.rvalue(Register::Result)?;
                Slot::Register(Register::Result)
            };
            self.code.add_instruction(Instruction::Out(IoOp::Register(slot)));
        }
        self.code.add_instruction(Instruction::Out(IoOp::Printf(format)));
        Ok(())
    }
}

/// Trimmed contents of each `{...}` field in a printf format.
fn placeholders(format: &str) -> impl Iterator<Item = &str> {
    format.split('{').skip(1).filter_map(|part| {
        part.split_once('}').map(|(field, _)| field.trim())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::compile_source;
    use crate::dsl::instruction::{JumpCondition, LoopVar};

    fn compile(source: &str) -> Program {
        compile_source(source).unwrap()
    }

    fn errors(source: &str) -> Vec<String> {
        compile_source(source)
            .unwrap_err()
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    fn moveq(value: impl Into<Value>, dest: impl Into<Slot>) -> Instruction {
        Instruction::MoveQ {
            value: value.into(),
            dest: dest.into(),
        }
    }

    #[test]
    fn register_setters_and_set() {
        let program = compile("hue 120 saturation 50 set \"Top\"");
        assert_eq!(program.instructions, vec![
            moveq(120.0, Register::Hue),
            moveq(50.0, Register::Saturation),
            moveq("Top", Register::Name),
            moveq(Operand::Light, Register::Operand),
            Instruction::Color,
        ]);
    }

    #[test]
    fn multiple_targets_and_zones() {
        let program = compile("set all and group \"Pole\" and \"Strip\" zone 7");
        assert_eq!(program.instructions, vec![
            moveq(Operand::All, Register::Operand),
            Instruction::Color,
            moveq("Pole", Register::Name),
            moveq(Operand::Group, Register::Operand),
            Instruction::Color,
            moveq("Strip", Register::Name),
            moveq(7.0, Register::FirstZone),
            moveq(Value::NULL, Register::LastZone),
            moveq(Operand::MzLight, Register::Operand),
            Instruction::Color,
        ]);
    }

    #[test]
    fn matrix_modifiers_in_any_order() {
        let program = compile("set \"Candle\" column 3 4 top row 2");
        let tail: Vec<Instruction> = program.instructions.iter().skip(1).cloned().collect();
        assert_eq!(tail, vec![
            moveq(Value::NULL, Register::FirstRow),
            moveq(Value::NULL, Register::LastRow),
            moveq(Value::NULL, Register::FirstColumn),
            moveq(Value::NULL, Register::LastColumn),
            moveq(3.0, Register::FirstColumn),
            moveq(4.0, Register::LastColumn),
            moveq(2.0, Register::FirstRow),
            moveq(Value::NULL, Register::LastRow),
            moveq(Operand::MatrixTop, Register::Operand),
            Instruction::Color,
        ]);
        let body = compile("off \"Candle\" row 1");
        assert!(body.instructions.contains(&moveq(Operand::Matrix, Register::Operand)));
    }

    #[test]
    fn zone_range_stops_at_register() {
        let program = compile("set \"Strip\" zone 5 7 hue 3");
        assert!(program.instructions.contains(&moveq(7.0, Register::LastZone)));
        assert_eq!(program.instructions.last(), Some(&moveq(3.0, Register::Hue)));
        let single = compile("off \"Strip\" zone 5 hue 3");
        assert!(single.instructions.contains(&moveq(Value::NULL, Register::LastZone)));
        assert!(single.instructions.contains(&Instruction::Power(false)));
    }

    #[test]
    fn constants_and_variables() {
        let program = compile("define z \"hello\" assign y z print y");
        assert_eq!(program.instructions, vec![
            moveq("hello", Slot::var("z")),
            Instruction::Move { src: Slot::var("z"), dest: Slot::var("y") },
            Instruction::Move { src: Slot::var("y"), dest: Register::Result.into() },
            Instruction::Out(IoOp::Register(Register::Result.into())),
            Instruction::Out(IoOp::Print),
        ]);
    }

    #[test]
    fn printf_fields() {
        let program = compile("assign y 5 printf \"{} {saturation} {y}\" saturation");
        assert_eq!(&program.instructions[1..], &[
            Instruction::Out(IoOp::Register(Register::Saturation.into())),
            Instruction::Out(IoOp::Printf("{} {saturation} {y}".into())),
        ]);
        assert_eq!(errors("printf \"{zz}\""), vec!["Not a data variable: \"zz\""]);
    }

    #[test]
    fn routine_jumps_over_body() {
        let program = compile("define warm with b brightness b kelvin 2700 warm 50");
        let routine = program.routines.get("warm").unwrap();
        assert_eq!(routine.params, vec!["b".to_string()]);
        assert_eq!(routine.entry, 1);
        assert_eq!(program.instructions[0], Instruction::Jump {
            condition: JumpCondition::Always,
            offset: 3,
        });
        assert_eq!(program.instructions[2], Instruction::EndRoutine);
        assert_eq!(&program.instructions[3..], &[
            moveq(2700.0, Register::Kelvin),
            moveq(50.0, Register::Result),
            Instruction::BindArg { name: "b".into(), src: Register::Result.into() },
            Instruction::Jsr("warm".into()),
        ]);
    }

    #[test]
    fn routine_params_stop_at_routine_names() {
        let program = compile(
            "define inner with x hue x \
             define outer with outer_hue inner outer_hue \
             outer 30",
        );
        assert_eq!(program.routines.get("outer").unwrap().params, vec!["outer_hue".to_string()]);
        let jsrs = program
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Jsr(_)))
            .count();
        assert_eq!(jsrs, 2);
    }

    #[test]
    fn params_are_local_to_routine() {
        assert_eq!(
            errors("define f with x hue x saturation x"),
            vec!["Not a data variable: \"x\""]
        );
    }

    #[test]
    fn if_else_blocks() {
        let program = compile("if {1 < 2} hue 1 else begin hue 2 saturation 3 end");
        let jumps: Vec<_> = program
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Jump { .. }))
            .collect();
        assert_eq!(jumps.len(), 2);
        assert!(program.instructions.contains(&moveq(3.0, Register::Saturation)));
    }

    #[test]
    fn time_patterns() {
        let program = compile("time at 12:30 or *:15");
        assert!(matches!(
            &program.instructions[0],
            Instruction::MoveQ { value: Value::At(patterns), .. } if patterns.len() == 2
        ));
        assert!(!errors("time at 25:00").is_empty());
    }

    #[test]
    fn unknown_names() {
        assert_eq!(errors("hue 5 Frank"), vec!["Unknown name: \"Frank\""]);
        assert_eq!(errors("hue 5 saturation x"), vec!["Not a data variable: \"x\""]);
    }

    #[test]
    fn string_literal_in_numeric_register() {
        assert_eq!(errors("hue \"red\""), vec!["hue needs a number, not a string"]);
    }

    #[test]
    fn errors_accumulate_after_recovery() {
        let errs = errors("hue @ saturation 5 set Frank brightness 10 units sideways");
        assert_eq!(errs.len(), 3);
        assert!(errs[0].starts_with("Expected a value"));
        assert_eq!(errs[1], "Not a data variable: \"Frank\"");
        assert!(errs[2].starts_with("Expected raw or logical"));
    }

    #[test]
    fn break_requires_loop() {
        assert_eq!(errors("break"), vec!["break outside of a loop"]);
        let program = compile("repeat begin hue 1 break end");
        let last = program.instructions.len() - 1;
        assert_eq!(program.instructions[last], Instruction::EndLoop);
        let (at, offset) = program
            .instructions
            .iter()
            .enumerate()
            .find_map(|(i, inst)| match inst {
                Instruction::Jump { condition: JumpCondition::Always, offset } if *offset > 0 => {
                    Some((i, *offset))
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(at as i64 + offset, last as i64);
    }

    #[test]
    fn unterminated_block() {
        assert_eq!(errors("begin hue 5"), vec!["Missing end for begin"]);
    }

    #[test]
    fn define_redefinition_is_rejected() {
        assert_eq!(
            errors("define x 5 define x 6"),
            vec!["\"x\" is already defined"]
        );
        assert_eq!(errors("define c 1 assign c 2"), vec!["Cannot assign to constant \"c\""]);
    }

    #[test]
    fn loop_counter_is_a_loop_var() {
        let program = compile("repeat 3 set all");
        assert_eq!(program.instructions[1], moveq(3.0, LoopVar::Counter));
    }
}
