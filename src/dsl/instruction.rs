use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::model::{TimePattern, UnitMode};

/// What kind of thing a target name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operand {
    Light,
    Group,
    Location,
    All,
    Null,
    MzLight,
    /// Cells of a matrix light.
    Matrix,
    /// A matrix light's top cell, plus any body cells selected.
    MatrixTop,
}

impl Operand {
    pub fn is_matrix(self) -> bool {
        matches!(self, Operand::Matrix | Operand::MatrixTop)
    }
}

/// Named machine registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Register {
    Hue,
    Saturation,
    Brightness,
    Kelvin,
    Duration,
    Time,
    Name,
    Operand,
    FirstZone,
    LastZone,
    FirstRow,
    LastRow,
    FirstColumn,
    LastColumn,
    UnitMode,
    Result,
}

impl Register {
    /// Register named by a source word, including the one-letter forms.
    pub fn from_word(word: &str) -> Option<Register> {
        match word {
            "hue" | "h" => Some(Register::Hue),
            "saturation" | "s" => Some(Register::Saturation),
            "brightness" | "b" => Some(Register::Brightness),
            "kelvin" | "k" => Some(Register::Kelvin),
            "duration" => Some(Register::Duration),
            "time" => Some(Register::Time),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::Hue => "hue",
            Register::Saturation => "saturation",
            Register::Brightness => "brightness",
            Register::Kelvin => "kelvin",
            Register::Duration => "duration",
            Register::Time => "time",
            Register::Name => "name",
            Register::Operand => "operand",
            Register::FirstZone => "first_zone",
            Register::LastZone => "last_zone",
            Register::FirstRow => "first_row",
            Register::LastRow => "last_row",
            Register::FirstColumn => "first_column",
            Register::LastColumn => "last_column",
            Register::UnitMode => "unit_mode",
            Register::Result => "result",
        }
    }
}

/// Per-loop pseudo-registers used by generated loop code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LoopVar {
    Current,
    First,
    Last,
    Counter,
    Incr,
}

impl LoopVar {
    pub(crate) fn index(self) -> usize {
        match self {
            LoopVar::Current => 0,
            LoopVar::First => 1,
            LoopVar::Last => 2,
            LoopVar::Counter => 3,
            LoopVar::Incr => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Not,
    Neg,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl Operator {
    pub fn is_unary(self) -> bool {
        matches!(self, Operator::Not | Operator::Neg)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
            Operator::Neg => "neg",
            Operator::Eq => "==",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JumpCondition {
    Always,
    /// Taken when the RESULT register is falsy.
    IfFalse,
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
    Operand(Operand),
    UnitMode(UnitMode),
    /// Time-of-day patterns held by the `time` register.
    At(Vec<TimePattern>),
}

impl Value {
    pub const NULL: Value = Value::Operand(Operand::Null);

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Operand(Operand::Null))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::Operand(op) => *op != Operand::Null,
            Value::UnitMode(_) => true,
            Value::At(patterns) => !patterns.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::Operand(_) => "operand",
            Value::UnitMode(_) => "unit mode",
            Value::At(_) => "time pattern",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{n:.0}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Operand(op) => write!(f, "{op:?}"),
            Value::UnitMode(mode) => write!(f, "{mode}"),
            Value::At(patterns) => {
                let text: Vec<String> = patterns.iter().map(ToString::to_string).collect();
                write!(f, "{}", text.join(" or "))
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Operand> for Value {
    fn from(op: Operand) -> Self {
        Value::Operand(op)
    }
}

impl From<UnitMode> for Value {
    fn from(mode: UnitMode) -> Self {
        Value::UnitMode(mode)
    }
}

/// A storage location the machine can read and write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Slot {
    Register(Register),
    LoopVar(LoopVar),
    Var(String),
}

impl Slot {
    pub fn var(name: &str) -> Self {
        Slot::Var(name.to_string())
    }
}

impl From<Register> for Slot {
    fn from(reg: Register) -> Self {
        Slot::Register(reg)
    }
}

impl From<LoopVar> for Slot {
    fn from(var: LoopVar) -> Self {
        Slot::LoopVar(var)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Register(reg) => write!(f, "{}", reg.name()),
            Slot::LoopVar(var) => write!(f, "{var:?}"),
            Slot::Var(name) => write!(f, "${name}"),
        }
    }
}

/// An instruction operand: either a location to read or an immediate value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Param {
    Slot(Slot),
    Value(Value),
}

impl From<Slot> for Param {
    fn from(slot: Slot) -> Self {
        Param::Slot(slot)
    }
}

impl From<Register> for Param {
    fn from(reg: Register) -> Self {
        Param::Slot(Slot::Register(reg))
    }
}

impl From<LoopVar> for Param {
    fn from(var: LoopVar) -> Self {
        Param::Slot(Slot::LoopVar(var))
    }
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Param::Value(value)
    }
}

impl From<f64> for Param {
    fn from(n: f64) -> Self {
        Param::Value(Value::Number(n))
    }
}

impl From<bool> for Param {
    fn from(b: bool) -> Self {
        Param::Value(Value::Bool(b))
    }
}

impl From<Operand> for Param {
    fn from(op: Operand) -> Self {
        Param::Value(Value::Operand(op))
    }
}

impl From<UnitMode> for Param {
    fn from(mode: UnitMode) -> Self {
        Param::Value(Value::UnitMode(mode))
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Slot(slot) => write!(f, "{slot}"),
            Param::Value(Value::Str(s)) => write!(f, "\"{s}\""),
            Param::Value(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum IoOp {
    /// Queue a value for the next print.
    Register(Slot),
    Print,
    Println,
    Printf(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Instruction {
    Nop,
    Push(Slot),
    PushQ(Value),
    Pop(Slot),
    Op(Operator),
    /// Relative jump: the destination is this instruction's offset plus `offset`.
    Jump { condition: JumpCondition, offset: i64 },
    Loop,
    EndLoop,
    Jsr(String),
    /// Bind an evaluated argument into the frame of the next call.
    BindArg { name: String, src: Slot },
    EndRoutine,
    Move { src: Slot, dest: Slot },
    MoveQ { value: Value, dest: Slot },
    Disc(Param),
    DiscN(Param, Param),
    DiscP(Param, Param),
    DiscL(Param),
    Out(IoOp),
    Color,
    Power(bool),
    GetColor,
    Wait,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Nop => write!(f, "nop"),
            Instruction::Push(slot) => write!(f, "push {slot}"),
            Instruction::PushQ(value) => write!(f, "pushq {}", Param::Value(value.clone())),
            Instruction::Pop(slot) => write!(f, "pop {slot}"),
            Instruction::Op(op) => write!(f, "op {}", op.symbol()),
            Instruction::Jump { condition, offset } => {
                write!(f, "jump {condition:?} {offset:+}")
            }
            Instruction::Loop => write!(f, "loop"),
            Instruction::EndLoop => write!(f, "end_loop"),
            Instruction::Jsr(name) => write!(f, "jsr {name}"),
            Instruction::BindArg { name, src } => write!(f, "bind {name} <- {src}"),
            Instruction::EndRoutine => write!(f, "end_routine"),
            Instruction::Move { src, dest } => write!(f, "move {src} -> {dest}"),
            Instruction::MoveQ { value, dest } => {
                write!(f, "moveq {} -> {dest}", Param::Value(value.clone()))
            }
            Instruction::Disc(target) => write!(f, "disc {target}"),
            Instruction::DiscN(current, target) => write!(f, "discn {current} {target}"),
            Instruction::DiscP(current, target) => write!(f, "discp {current} {target}"),
            Instruction::DiscL(target) => write!(f, "discl {target}"),
            Instruction::Out(io) => match io {
                IoOp::Register(slot) => write!(f, "out {slot}"),
                IoOp::Print => write!(f, "out print"),
                IoOp::Println => write!(f, "out println"),
                IoOp::Printf(fmt) => write!(f, "out printf \"{fmt}\""),
            },
            Instruction::Color => write!(f, "color"),
            Instruction::Power(on) => write!(f, "power {}", if *on { "on" } else { "off" }),
            Instruction::GetColor => write!(f, "get_color"),
            Instruction::Wait => write!(f, "wait"),
        }
    }
}

/// A user routine whose body sits inline in the program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Routine {
    pub name: String,
    pub params: Vec<String>,
    pub entry: usize,
}

/// Compiled output: a flat instruction list plus the routine table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub routines: IndexMap<String, Routine>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// One instruction per line, prefixed with its offset.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (offset, inst) in self.instructions.iter().enumerate() {
            if let Some(routine) = self.routines.values().find(|r| r.entry == offset) {
                out.push_str(&format!("{}:\n", routine.name));
            }
            out.push_str(&format!("{offset:>5}  {inst}\n"));
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn register_words() {
        assert_eq!(Register::from_word("h"), Some(Register::Hue));
        assert_eq!(Register::from_word("kelvin"), Some(Register::Kelvin));
        assert_eq!(Register::from_word("name"), None);
    }

    #[test]
    fn truthiness() {
        assert!(Value::from("x").is_truthy());
        assert!(!Value::NULL.is_truthy());
        assert!(!Value::from(0.0).is_truthy());
        assert_eq!(Value::from(true).as_number(), Some(1.0));
    }

    #[test]
    fn numbers_print_without_trailing_zero() {
        assert_eq!(Value::from(123.0).to_string(), "123");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from(-4.0).to_string(), "-4");
    }

    #[test]
    fn disassembly_marks_routines() {
        let program = Program {
            instructions: vec![
                Instruction::Jump { condition: JumpCondition::Always, offset: 3 },
                Instruction::MoveQ { value: Value::from(120.0), dest: Register::Hue.into() },
                Instruction::EndRoutine,
                Instruction::Jsr("warm".into()),
            ],
            routines: IndexMap::from([(
                "warm".to_string(),
                Routine { name: "warm".into(), params: Vec::new(), entry: 1 },
            )]),
        };
        let text = program.disassemble();
        assert!(text.contains("warm:\n    1  moveq 120 -> hue"));
        assert!(text.contains("jump Always +3"));
    }
}
