use super::instruction::{
    Instruction, JumpCondition, LoopVar, Operand, Operator, Param, Register, Slot, Value,
};

/// A forward jump waiting for its destination. Consumed when resolved, so a
/// jump cannot be patched twice.
#[derive(Debug)]
#[must_use = "a pending jump must be resolved"]
pub struct JumpMarker {
    jump: usize,
}

/// The top of a loop, for a later backward jump.
#[derive(Debug)]
#[must_use = "a loop top must be closed with jump_back"]
pub struct LoopTop {
    offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

/// Builds an instruction list. Control flow is emitted with markers and
/// patched in place; every jump offset is relative to the jump itself.
#[derive(Debug, Default)]
pub struct CodeGen {
    code: Vec<Instruction>,
}

impl CodeGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.code
    }

    pub fn into_instructions(self) -> Vec<Instruction> {
        self.code
    }

    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn add_instruction(&mut self, inst: Instruction) -> usize {
        self.code.push(inst);
        self.code.len() - 1
    }

    pub fn add_instructions(&mut self, insts: impl IntoIterator<Item = Instruction>) {
        self.code.extend(insts);
    }

    // ── Stack and arithmetic ───────────────────────────────────────

    /// Push a slot's value, or an immediate.
    pub fn push(&mut self, param: impl Into<Param>) {
        let inst = match param.into() {
            Param::Slot(slot) => Instruction::Push(slot),
            Param::Value(value) => Instruction::PushQ(value),
        };
        self.code.push(inst);
    }

    pub fn pop(&mut self, dest: impl Into<Slot>) {
        self.code.push(Instruction::Pop(dest.into()));
    }

    pub fn move_to(&mut self, src: impl Into<Param>, dest: impl Into<Slot>) {
        let dest = dest.into();
        let inst = match src.into() {
            Param::Slot(src) => Instruction::Move { src, dest },
            Param::Value(value) => Instruction::MoveQ { value, dest },
        };
        self.code.push(inst);
    }

    /// Leave `a op b` on the eval stack.
    pub fn binop(&mut self, op: Operator, a: impl Into<Param>, b: impl Into<Param>) {
        self.push(a);
        self.push(b);
        self.code.push(Instruction::Op(op));
    }

    pub fn addition(&mut self, a: impl Into<Param>, b: impl Into<Param>) {
        self.binop(Operator::Add, a, b);
    }

    pub fn subtraction(&mut self, a: impl Into<Param>, b: impl Into<Param>) {
        self.binop(Operator::Sub, a, b);
    }

    /// `dest = dest op operand`
    fn op_equals(&mut self, op: Operator, dest: impl Into<Slot>, operand: impl Into<Param>) {
        let dest = dest.into();
        self.binop(op, dest.clone(), operand);
        self.pop(dest);
    }

    pub fn plus_equals(&mut self, dest: impl Into<Slot>, delta: impl Into<Param>) {
        self.op_equals(Operator::Add, dest, delta);
    }

    pub fn minus_equals(&mut self, dest: impl Into<Slot>, delta: impl Into<Param>) {
        self.op_equals(Operator::Sub, dest, delta);
    }

    pub fn times_equals(&mut self, dest: impl Into<Slot>, factor: impl Into<Param>) {
        self.op_equals(Operator::Mul, dest, factor);
    }

    /// Store the boolean `a op b` in RESULT, ready for `if_true_start`.
    pub fn test_op(&mut self, op: Operator, a: impl Into<Param>, b: impl Into<Param>) {
        self.binop(op, a, b);
        self.pop(Register::Result);
    }

    // ── Control flow ────────────────────────────────────────────────

    pub fn mark(&self) -> LoopTop {
        LoopTop {
            offset: self.current_offset(),
        }
    }

    pub fn jump_back(&mut self, top: LoopTop) {
        let offset = offset_between(self.current_offset(), top.offset);
        self.code.push(Instruction::Jump {
            condition: JumpCondition::Always,
            offset,
        });
    }

    fn pending_jump(&mut self, condition: JumpCondition) -> JumpMarker {
        let jump = self.add_instruction(Instruction::Jump {
            condition,
            offset: 0,
        });
        JumpMarker { jump }
    }

    /// Unconditional forward jump, resolved later with `resolve`.
    pub fn jump_forward(&mut self) -> JumpMarker {
        self.pending_jump(JumpCondition::Always)
    }

    /// Start a block that runs only when RESULT is truthy.
    pub fn if_true_start(&mut self) -> JumpMarker {
        self.pending_jump(JumpCondition::IfFalse)
    }

    /// Close the true block and open the else block.
    pub fn if_else(&mut self, marker: JumpMarker) -> JumpMarker {
        let skip_else = self.pending_jump(JumpCondition::Always);
        self.patch(marker, self.current_offset());
        skip_else
    }

    pub fn if_end(&mut self, marker: JumpMarker) {
        self.resolve(marker);
    }

    /// Point a pending jump at the next instruction to be emitted.
    pub fn resolve(&mut self, marker: JumpMarker) {
        self.patch(marker, self.current_offset());
    }

    fn patch(&mut self, marker: JumpMarker, target: usize) {
        if let Some(Instruction::Jump { offset, .. }) = self.code.get_mut(marker.jump) {
            *offset = offset_between(marker.jump, target);
        }
    }

    // ── Traversal ───────────────────────────────────────────────────

    /// Run `body` once per light with the light's name in CURRENT. `operand`
    /// is `All` for every light, or `Group`/`Location` with the set's name
    /// already in FIRST.
    pub fn iter_lights(&mut self, operand: Operand, body: Vec<Instruction>) {
        self.traverse_lights(operand, body, Direction::Forward);
    }

    pub fn iter_lights_reverse(&mut self, operand: Operand, body: Vec<Instruction>) {
        self.traverse_lights(operand, body, Direction::Reverse);
    }

    /// Run `body` once per group or location name.
    pub fn iter_sets(&mut self, operand: Operand, body: Vec<Instruction>) {
        self.traverse(operand, Param::from(Operand::All), body, Direction::Forward);
    }

    pub fn iter_sets_reverse(&mut self, operand: Operand, body: Vec<Instruction>) {
        self.traverse(operand, Param::from(Operand::All), body, Direction::Reverse);
    }

    fn traverse_lights(&mut self, operand: Operand, body: Vec<Instruction>, dir: Direction) {
        if operand == Operand::All {
            self.traverse(Operand::Light, Param::from(Operand::All), body, dir);
        } else {
            self.traverse(operand, Param::from(LoopVar::First), body, dir);
        }
    }

    fn traverse(&mut self, operand: Operand, target: Param, body: Vec<Instruction>, dir: Direction) {
        let (start, step): (fn(Param) -> Instruction, fn(Param, Param) -> Instruction) = match dir
        {
            Direction::Forward => (Instruction::Disc, Instruction::DiscN),
            Direction::Reverse => (Instruction::DiscL, Instruction::DiscP),
        };
        self.move_to(operand, Register::Operand);
        self.add_instruction(start(target.clone()));
        let top = self.mark();
        self.move_to(Register::Result, LoopVar::Current);
        self.test_op(Operator::NotEq, LoopVar::Current, Value::NULL);
        let done = self.if_true_start();
        self.add_instructions(body);
        // The body may have pointed OPERAND elsewhere.
        self.move_to(operand, Register::Operand);
        self.add_instruction(step(LoopVar::Current.into(), target));
        self.jump_back(top);
        self.if_end(done);
    }
}

#[allow(clippy::cast_possible_wrap)]
fn offset_between(from: usize, to: usize) -> i64 {
    to as i64 - from as i64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn jump_offsets(code: &CodeGen) -> Vec<(usize, i64)> {
        code.instructions()
            .iter()
            .enumerate()
            .filter_map(|(i, inst)| match inst {
                Instruction::Jump { offset, .. } => Some((i, *offset)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn if_without_else() {
        let mut code = CodeGen::new();
        code.test_op(Operator::Gt, 2.0, 1.0);
        let m = code.if_true_start();
        code.move_to(1.0, Register::Hue);
        code.move_to(2.0, Register::Hue);
        code.if_end(m);
        // push, push, op, pop, jump, moveq, moveq
        assert_eq!(jump_offsets(&code), vec![(4, 3)]);
    }

    #[test]
    fn if_else_lands_after_each_block() {
        let mut code = CodeGen::new();
        let m = code.if_true_start();
        code.move_to(1.0, Register::Hue);
        let m = code.if_else(m);
        code.move_to(2.0, Register::Hue);
        code.move_to(3.0, Register::Hue);
        code.if_end(m);
        // 0 jump-if-false, 1 moveq, 2 jump, 3 moveq, 4 moveq, 5 <end>
        assert_eq!(jump_offsets(&code), vec![(0, 3), (2, 3)]);
    }

    #[test]
    fn jump_back_is_negative() {
        let mut code = CodeGen::new();
        code.add_instruction(Instruction::Nop);
        let top = code.mark();
        code.minus_equals(LoopVar::Counter, 1.0);
        code.jump_back(top);
        // minus_equals emits four instructions starting at 1; jump at 5.
        assert_eq!(jump_offsets(&code), vec![(5, -4)]);
    }

    #[test]
    fn addition_pushes_both_operands() {
        let mut code = CodeGen::new();
        code.addition(LoopVar::Counter, 2.0);
        assert_eq!(
            code.instructions(),
            &[
                Instruction::Push(LoopVar::Counter.into()),
                Instruction::PushQ(Value::Number(2.0)),
                Instruction::Op(Operator::Add),
            ]
        );
    }

    #[test]
    fn compound_assignment_shape() {
        let mut code = CodeGen::new();
        code.times_equals(Slot::var("x"), -1.0);
        assert_eq!(
            code.instructions(),
            &[
                Instruction::Push(Slot::var("x")),
                Instruction::PushQ(Value::Number(-1.0)),
                Instruction::Op(Operator::Mul),
                Instruction::Pop(Slot::var("x")),
            ]
        );
    }

    #[test]
    fn traversal_all_lights() {
        let mut code = CodeGen::new();
        code.iter_lights(Operand::All, vec![Instruction::Color]);
        let insts = code.instructions();
        assert_eq!(insts.first(), Some(&Instruction::MoveQ {
            value: Value::Operand(Operand::Light),
            dest: Register::Operand.into(),
        }));
        assert_eq!(insts.get(1), Some(&Instruction::Disc(Operand::All.into())));
        assert!(insts.contains(&Instruction::DiscN(
            LoopVar::Current.into(),
            Operand::All.into()
        )));
        // Exit jump lands just past the backward jump.
        let jumps = jump_offsets(&code);
        let (exit_at, exit_by) = jumps.first().copied().unwrap();
        let (back_at, back_by) = jumps.last().copied().unwrap();
        assert_eq!(exit_at as i64 + exit_by, insts.len() as i64);
        assert_eq!(back_at as i64 + back_by, 2);
    }

    #[test]
    fn reverse_group_traversal_reads_first() {
        let mut code = CodeGen::new();
        code.iter_lights_reverse(Operand::Group, Vec::new());
        let insts = code.instructions();
        assert_eq!(insts.get(1), Some(&Instruction::DiscL(LoopVar::First.into())));
        assert!(insts.contains(&Instruction::DiscP(
            LoopVar::Current.into(),
            LoopVar::First.into()
        )));
    }
}
