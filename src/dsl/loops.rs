use super::codegen::CodeGen;
use super::error::CompileError;
use super::instruction::{Instruction, LoopVar, Operand, Operator, Register, Slot};
use super::lexer::Token;
use super::parser::Parser;
use super::symbols::SymbolKind;
use crate::model::UnitMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopType {
    All,
    Counted,
    Groups,
    Infinite,
    Lights,
    Locations,
    While,
    With,
}

impl LoopType {
    /// Loops that visit lights, groups or locations one name at a time.
    fn iterates(self) -> bool {
        matches!(
            self,
            LoopType::All | LoopType::Lights | LoopType::Groups | LoopType::Locations
        )
    }

    fn unbounded(self) -> bool {
        matches!(self, LoopType::Infinite | LoopType::While)
    }
}

struct LoopParser {
    loop_type: LoopType,
    light_var: Option<String>,
    index_var: Option<String>,
}

/// Compile everything after `repeat`.
///
/// The emitted shape is: `Loop`, setup, a marked test that jumps out when
/// RESULT is false, the body, the counter/index updates, a jump back to the
/// test, then `EndLoop`. `break` jumps land on the `EndLoop`.
pub(super) fn repeat(p: &mut Parser) -> Result<(), CompileError> {
    p.code.add_instruction(Instruction::Loop);
    let mut lp = LoopParser {
        loop_type: detect(p),
        light_var: None,
        index_var: None,
    };
    lp.pre_loop(p)?;

    let top = p.code.mark();
    lp.loop_test(p)?;
    let exit = p.code.if_true_start();
    p.breaks.push(Vec::new());
    lp.body(p)?;
    lp.post_loop(p);
    p.code.jump_back(top);
    p.code.if_end(exit);

    for pending in p.breaks.pop().unwrap_or_default() {
        p.code.resolve(pending);
    }
    p.code.add_instruction(Instruction::EndLoop);
    Ok(())
}

fn detect(p: &mut Parser) -> LoopType {
    let loop_type = match p.peek() {
        Token::While => LoopType::While,
        Token::With => return LoopType::With,
        Token::In => LoopType::Lights,
        Token::All => return LoopType::All,
        Token::Group => LoopType::Groups,
        Token::Location => LoopType::Locations,
        _ if p.at_rvalue() => return LoopType::Counted,
        _ => return LoopType::Infinite,
    };
    p.advance();
    loop_type
}

/// Body for a set traversal that stacks each visited name.
fn stack_names() -> Vec<Instruction> {
    let mut body = CodeGen::new();
    body.plus_equals(LoopVar::Counter, 1.0);
    body.push(LoopVar::Current);
    body.into_instructions()
}

/// `A and B and ...`: each item stacks its light names. Items are emitted
/// last-first and sets are walked in reverse, so the first name pops first.
fn light_list(p: &mut Parser) -> Result<(), CompileError> {
    let item = p.capture(light_item)?;
    if p.eat(&Token::And) {
        light_list(p)?;
    }
    p.code.add_instructions(item.into_instructions());
    Ok(())
}

fn light_item(p: &mut Parser) -> Result<(), CompileError> {
    match p.peek() {
        Token::All => {
            p.advance();
            p.code.iter_lights_reverse(Operand::All, stack_names());
        }
        Token::Group | Token::Location => {
            let operand = if p.advance() == Token::Group {
                Operand::Group
            } else {
                Operand::Location
            };
            p.rvalue(LoopVar::First)?;
            p.code.iter_lights_reverse(operand, stack_names());
        }
        _ => {
            p.rvalue(Register::Result)?;
            p.code.push(Register::Result);
            p.code.plus_equals(LoopVar::Counter, 1.0);
        }
    }
    Ok(())
}

impl LoopParser {
    fn pre_loop(&mut self, p: &mut Parser) -> Result<(), CompileError> {
        if self.loop_type.unbounded() {
            return Ok(());
        }
        if self.loop_type == LoopType::Counted {
            p.rvalue(LoopVar::Counter)?;
        } else if self.loop_type.iterates() {
            p.code.move_to(0.0, LoopVar::Counter);
            match self.loop_type {
                LoopType::Groups => p.code.iter_sets_reverse(Operand::Group, stack_names()),
                LoopType::Locations => p.code.iter_sets_reverse(Operand::Location, stack_names()),
                _ => light_list(p)?,
            }
            if p.eat(&Token::As) {
                let name = p.expect_name("a variable name after as")?;
                p.context.add_variable(&name, SymbolKind::Variable);
                self.light_var = Some(name);
            }
        }
        if p.at(&Token::With) {
            self.index_var(p)?;
        } else if self.loop_type == LoopType::With {
            return Err(p.unexpected("with"));
        }
        Ok(())
    }

    /// `with name from A to B` or `with name cycle [start]`.
    fn index_var(&mut self, p: &mut Parser) -> Result<(), CompileError> {
        let span = p.span();
        p.advance();
        let name = p.expect_name("a variable name after with")?;
        if p.eat(&Token::From) {
            p.rvalue(LoopVar::First)?;
            p.expect(&Token::To, "to")?;
            p.rvalue(LoopVar::Last)?;
            p.code.move_to(LoopVar::First, Slot::var(&name));
            if self.loop_type == LoopType::With {
                calc_counter(&mut p.code);
            } else {
                calc_incr(&mut p.code);
            }
        } else if p.eat(&Token::Cycle) {
            if self.loop_type == LoopType::With {
                return Err(CompileError::parser(
                    "cycle needs a repeat count or a set to walk",
                    span,
                ));
            }
            if p.at_rvalue() {
                p.rvalue(LoopVar::First)?;
            } else {
                p.code.move_to(0.0, LoopVar::First);
            }
            p.code.move_to(LoopVar::First, Slot::var(&name));
            cycle_incr(&mut p.code);
        } else {
            return Err(p.unexpected("from or cycle"));
        }
        p.context.add_variable(&name, SymbolKind::Variable);
        self.index_var = Some(name);
        Ok(())
    }

    fn loop_test(&self, p: &mut Parser) -> Result<(), CompileError> {
        match self.loop_type {
            LoopType::Infinite => p.code.move_to(true, Register::Result),
            LoopType::While => p.rvalue(Register::Result)?,
            _ => p.code.test_op(Operator::Gt, LoopVar::Counter, 0.0),
        }
        Ok(())
    }

    fn body(&self, p: &mut Parser) -> Result<(), CompileError> {
        if self.loop_type.iterates() {
            match &self.light_var {
                Some(name) => p.code.pop(Slot::var(name)),
                None => p.code.pop(Register::Result),
            }
        }
        p.statement()
    }

    fn post_loop(&self, p: &mut Parser) {
        if !self.loop_type.unbounded() {
            p.code.minus_equals(LoopVar::Counter, 1.0);
        }
        if let Some(name) = &self.index_var {
            p.code.plus_equals(Slot::var(name), LoopVar::Incr);
        }
    }
}

/// `from A to B` with no other bound: run `|B - A| + 1` times, stepping by
/// one toward B.
fn calc_counter(code: &mut CodeGen) {
    code.subtraction(LoopVar::Last, LoopVar::First);
    code.pop(LoopVar::Counter);
    code.test_op(Operator::Lt, LoopVar::Counter, 0.0);
    let marker = code.if_true_start();
    code.times_equals(LoopVar::Counter, -1.0);
    code.move_to(-1.0, LoopVar::Incr);
    let marker = code.if_else(marker);
    code.move_to(1.0, LoopVar::Incr);
    code.if_end(marker);
    code.plus_equals(LoopVar::Counter, 1.0);
}

/// Spread `from A to B` evenly over an existing count, landing on B.
fn calc_incr(code: &mut CodeGen) {
    code.test_op(Operator::NotEq, LoopVar::Counter, 1.0);
    let marker = code.if_true_start();
    code.subtraction(LoopVar::Last, LoopVar::First);
    code.subtraction(LoopVar::Counter, 1.0);
    code.add_instruction(Instruction::Op(Operator::Div));
    code.pop(LoopVar::Incr);
    let marker = code.if_else(marker);
    code.move_to(0.0, LoopVar::Incr);
    code.if_end(marker);
}

/// Step one full turn of the hue wheel over the count. A zero count leaves
/// the increment at zero; the loop body never runs anyway.
fn cycle_incr(code: &mut CodeGen) {
    code.test_op(Operator::NotEq, LoopVar::Counter, 0.0);
    let nonzero = code.if_true_start();
    code.test_op(Operator::Eq, Register::UnitMode, UnitMode::Raw);
    let marker = code.if_true_start();
    code.push(UnitMode::Raw.full_circle());
    let marker = code.if_else(marker);
    code.push(UnitMode::Logical.full_circle());
    code.if_end(marker);
    code.push(LoopVar::Counter);
    code.add_instruction(Instruction::Op(Operator::Div));
    code.pop(LoopVar::Incr);
    let nonzero = code.if_else(nonzero);
    code.move_to(0.0, LoopVar::Incr);
    code.if_end(nonzero);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::dsl::compile_source;
    use crate::dsl::instruction::{Instruction, LoopVar, Slot};

    fn count(source: &str, pred: impl Fn(&Instruction) -> bool) -> usize {
        compile_source(source)
            .unwrap()
            .instructions
            .iter()
            .filter(|i| pred(i))
            .count()
    }

    #[test]
    fn loops_are_bracketed() {
        for source in [
            "repeat 3 set all",
            "repeat set all",
            "repeat while {hue < 10} hue {hue + 1}",
            "repeat with i from 1 to 5 hue i",
            "repeat all as the_light set the_light",
            "repeat in \"Top\" and group \"Pole\" as l set l",
            "repeat group as g set group g",
            "repeat location as loc set location loc",
        ] {
            assert_eq!(count(source, |i| *i == Instruction::Loop), 1, "{source}");
            assert_eq!(count(source, |i| *i == Instruction::EndLoop), 1, "{source}");
        }
    }

    #[test]
    fn light_list_pops_into_loop_variable() {
        let pops = count("repeat in \"a\" and \"b\" as the_light set the_light", |i| {
            *i == Instruction::Pop(Slot::var("the_light"))
        });
        assert_eq!(pops, 1);
    }

    #[test]
    fn index_var_is_declared_for_body() {
        let source = "repeat 4 with brt from 0 to 100 brightness brt";
        let program = compile_source(source).unwrap();
        assert!(program.instructions.contains(&Instruction::Move {
            src: LoopVar::First.into(),
            dest: Slot::var("brt"),
        }));
        assert!(program.instructions.contains(&Instruction::Pop(Slot::var("brt"))));
    }

    #[test]
    fn cycle_requires_a_bound() {
        let errors = compile_source("repeat with x cycle hue x").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.iter().all(|e| e.message.starts_with("cycle needs")));
    }

    #[test]
    fn loop_variable_outside_source_is_unknown() {
        assert!(compile_source("repeat all set the_light").is_err());
        assert!(compile_source("repeat with i to 3 hue i").is_err());
    }
}
