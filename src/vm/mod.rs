pub mod call_stack;
pub mod discover;
pub mod eval;
pub mod output;
pub mod registers;

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::device::{DeviceError, LightDevices, Target, POWER_ON};
use crate::dsl::instruction::{
    Instruction, IoOp, JumpCondition, LoopVar, Operand, Param, Program, Register, Slot, Value,
};
use crate::jobs::CancelToken;
use crate::model::{ColorMatrix, Hsbk, Rect, SortedLightSet, UnitMode, BODY_ROW, TOP_CELL};

pub use call_stack::{CallStack, MAX_CALL_DEPTH};
pub use eval::EvalStack;
pub use output::{CapturedOutput, PrintSink, StdoutSink};
pub use registers::Registers;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Undefined variable: \"{0}\"")]
    UndefinedVariable(String),
    #[error("Expected a {expected}, found a {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Evaluation stack underflow")]
    StackUnderflow,
    #[error("Unknown routine: \"{0}\"")]
    UnknownRoutine(String),
    #[error("Unknown {kind}: \"{name}\"")]
    UnknownSet { kind: &'static str, name: String },
    #[error("Call depth exceeded {0}")]
    CallDepthExceeded(usize),
    #[error("Jump at {from} by {offset} leaves the program")]
    JumpOutOfRange { from: usize, offset: i64 },
    #[error("Loop variable read outside a loop")]
    NoActiveLoop,
    #[error("Routine end reached outside a routine")]
    ReturnOutsideRoutine,
    #[error("No light selected")]
    NoTarget,
    #[error("Invalid zone: {0}")]
    InvalidZone(f64),
    #[error("Invalid row or column: {0}")]
    InvalidCell(f64),
    #[error("Cells outside the matrix of \"{0}\"")]
    CellsOutOfRange(String),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl RuntimeError {
    pub fn type_mismatch(expected: &'static str, found: &Value) -> Self {
        RuntimeError::TypeMismatch {
            expected,
            found: found.type_name(),
        }
    }

    pub fn unknown_set(operand: Operand, name: &str) -> Self {
        let kind = if operand == Operand::Location {
            "location"
        } else {
            "group"
        };
        RuntimeError::UnknownSet {
            kind,
            name: name.to_string(),
        }
    }
}

/// How a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Cancelled while waiting or before a device call.
    Stopped,
}

/// Collaborators for one run.
pub struct VmContext<'a> {
    pub devices: &'a dyn LightDevices,
    pub lights: &'a SortedLightSet,
    pub clock: &'a dyn Clock,
    pub output: &'a dyn PrintSink,
    pub cancel: &'a CancelToken,
}

enum Flow {
    Next,
    Goto(usize),
    Stop,
}

/// Loop pseudo-registers plus the eval-stack depth at loop entry.
#[derive(Debug, Clone)]
struct LoopFrame {
    vars: [Value; 5],
    eval_depth: usize,
}

/// Executes compiled programs. State survives between runs until `reset`.
#[derive(Debug, Clone, Default)]
pub struct Machine {
    registers: Registers,
    calls: CallStack,
    eval: EvalStack,
    loops: Vec<LoopFrame>,
    queued: Vec<Value>,
}

impl Machine {
    pub fn new(unit_mode: UnitMode) -> Self {
        Self {
            registers: Registers::new(unit_mode),
            ..Self::default()
        }
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn globals(&self) -> &HashMap<String, Value> {
        self.calls.globals()
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.calls.get_variable(name)
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.registers.unit_mode());
    }

    /// Run `program` from the top until it falls off the end, is cancelled,
    /// or fails.
    pub fn run(&mut self, program: &Program, ctx: &VmContext<'_>) -> Result<RunOutcome, RuntimeError> {
        let mut pc = 0;
        while let Some(inst) = program.instructions.get(pc) {
            match self.step(program, inst, pc, ctx)? {
                Flow::Next => pc += 1,
                Flow::Goto(target) => pc = target,
                Flow::Stop => return Ok(RunOutcome::Stopped),
            }
        }
        Ok(RunOutcome::Completed)
    }

    fn step(
        &mut self,
        program: &Program,
        inst: &Instruction,
        pc: usize,
        ctx: &VmContext<'_>,
    ) -> Result<Flow, RuntimeError> {
        match inst {
            Instruction::Nop => {}
            Instruction::Push(slot) => {
                let value = self.read(slot)?;
                self.eval.push(value);
            }
            Instruction::PushQ(value) => self.eval.push(value.clone()),
            Instruction::Pop(slot) => {
                let value = self.eval.pop()?;
                self.write(slot, value)?;
            }
            Instruction::Op(op) => self.eval.apply(*op)?,
            Instruction::Jump { condition, offset } => {
                let taken = match condition {
                    JumpCondition::Always => true,
                    JumpCondition::IfFalse => !self.registers.result().is_truthy(),
                };
                if taken {
                    return jump_target(pc, *offset, program.len()).map(Flow::Goto);
                }
            }
            Instruction::Loop => self.loops.push(LoopFrame {
                vars: std::array::from_fn(|_| Value::Number(0.0)),
                eval_depth: self.eval.len(),
            }),
            Instruction::EndLoop => {
                if let Some(frame) = self.loops.pop() {
                    self.eval.truncate(frame.eval_depth);
                }
            }
            Instruction::Jsr(name) => {
                let routine = program
                    .routines
                    .get(name)
                    .ok_or_else(|| RuntimeError::UnknownRoutine(name.clone()))?;
                trace!(routine = %name, depth = self.calls.depth(), "call");
                self.calls.set_return(pc + 1);
                self.calls.push_current()?;
                return Ok(Flow::Goto(routine.entry));
            }
            Instruction::BindArg { name, src } => {
                let value = self.read(src)?;
                self.calls.add_param(name, value);
            }
            Instruction::EndRoutine => {
                let resume = self
                    .calls
                    .pop_current()
                    .ok_or(RuntimeError::ReturnOutsideRoutine)?;
                return Ok(Flow::Goto(resume));
            }
            Instruction::Move { src, dest } => {
                let value = self.read(src)?;
                self.write(dest, value)?;
            }
            Instruction::MoveQ { value, dest } => self.write(dest, value.clone())?,
            Instruction::Disc(target) => {
                let target = self.param(target)?;
                let found = discover::disc(ctx.lights, self.registers.operand(), &target);
                self.registers.set_result(found);
            }
            Instruction::DiscL(target) => {
                let target = self.param(target)?;
                let found = discover::disc_last(ctx.lights, self.registers.operand(), &target);
                self.registers.set_result(found);
            }
            Instruction::DiscN(current, target) => {
                let (current, target) = (self.param(current)?, self.param(target)?);
                let found =
                    discover::disc_next(ctx.lights, self.registers.operand(), &current, &target);
                self.registers.set_result(found);
            }
            Instruction::DiscP(current, target) => {
                let (current, target) = (self.param(current)?, self.param(target)?);
                let found =
                    discover::disc_prev(ctx.lights, self.registers.operand(), &current, &target);
                self.registers.set_result(found);
            }
            Instruction::Out(io) => self.output(io, ctx)?,
            Instruction::Color => {
                if !self.time_wait(ctx) {
                    return Ok(Flow::Stop);
                }
                let color = self.registers.color();
                let duration = self.registers.duration_ms();
                if self.registers.operand().is_matrix() {
                    self.paint_matrix(ctx, color, duration)?;
                    return Ok(Flow::Next);
                }
                let sent = self.dispatch(ctx, |devices, target| match target {
                    Addressee::Device(target) => {
                        debug!(?target, %color, duration, "set color");
                        devices.set_color(&target, color, duration)
                    }
                    Addressee::Zones(name, first, last) => {
                        debug!(light = %name, first, last, %color, "set zone color");
                        devices.set_zone_color(name, first, last, color, duration)
                    }
                })?;
                if !sent {
                    return Ok(Flow::Stop);
                }
            }
            Instruction::Power(on) => {
                if !self.time_wait(ctx) {
                    return Ok(Flow::Stop);
                }
                let level = if *on { POWER_ON } else { 0 };
                let duration = self.registers.duration_ms();
                let sent = self.dispatch(ctx, |devices, target| {
                    let target = match target {
                        Addressee::Device(target) => target,
                        Addressee::Zones(name, ..) => Target::Light(name.to_string()),
                    };
                    debug!(?target, level, duration, "set power");
                    devices.set_power(&target, level, duration)
                })?;
                if !sent {
                    return Ok(Flow::Stop);
                }
            }
            Instruction::GetColor => {
                if ctx.cancel.is_cancelled() {
                    return Ok(Flow::Stop);
                }
                if let Some(color) = self.fetch_color(ctx)? {
                    self.registers.set_color(color);
                }
            }
            Instruction::Wait => {
                if !self.time_wait(ctx) {
                    return Ok(Flow::Stop);
                }
            }
        }
        Ok(Flow::Next)
    }

    // ── Storage ─────────────────────────────────────────────────────

    fn loop_var(&self, var: LoopVar) -> Result<&Value, RuntimeError> {
        self.loops
            .last()
            .and_then(|frame| frame.vars.get(var.index()))
            .ok_or(RuntimeError::NoActiveLoop)
    }

    fn read(&self, slot: &Slot) -> Result<Value, RuntimeError> {
        match slot {
            Slot::Register(reg) => Ok(self.registers.get(*reg)),
            Slot::LoopVar(var) => self.loop_var(*var).cloned(),
            Slot::Var(name) => self
                .calls
                .get_variable(name)
                .cloned()
                .ok_or_else(|| RuntimeError::UndefinedVariable(name.clone())),
        }
    }

    fn write(&mut self, slot: &Slot, value: Value) -> Result<(), RuntimeError> {
        match slot {
            Slot::Register(reg) => self.registers.put(*reg, value),
            Slot::LoopVar(var) => {
                let cell = self
                    .loops
                    .last_mut()
                    .and_then(|frame| frame.vars.get_mut(var.index()))
                    .ok_or(RuntimeError::NoActiveLoop)?;
                *cell = value;
                Ok(())
            }
            Slot::Var(name) => {
                self.calls.put_variable(name, value);
                Ok(())
            }
        }
    }

    fn param(&self, param: &Param) -> Result<Value, RuntimeError> {
        match param {
            Param::Slot(slot) => self.read(slot),
            Param::Value(value) => Ok(value.clone()),
        }
    }

    // ── Output ──────────────────────────────────────────────────────

    fn output(&mut self, io: &IoOp, ctx: &VmContext<'_>) -> Result<(), RuntimeError> {
        match io {
            IoOp::Register(slot) => {
                let value = self.read(slot)?;
                self.queued.push(value);
            }
            IoOp::Print | IoOp::Println => {
                let mut text = self
                    .queued
                    .drain(..)
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                text.push(if *io == IoOp::Print { ' ' } else { '\n' });
                ctx.output.emit(&text);
            }
            IoOp::Printf(format) => {
                let mut text = self.format(format)?;
                text.push('\n');
                self.queued.clear();
                ctx.output.emit(&text);
            }
        }
        Ok(())
    }

    /// Fill `{}` from the queued values in order and `{name}` from registers
    /// or variables.
    fn format(&self, format: &str) -> Result<String, RuntimeError> {
        let mut out = String::with_capacity(format.len());
        let mut positional = self.queued.iter();
        let mut rest = format;
        while let Some((before, after)) = rest.split_once('{') {
            let Some((field, tail)) = after.split_once('}') else {
                break;
            };
            out.push_str(before);
            let field = field.trim();
            if field.is_empty() {
                if let Some(value) = positional.next() {
                    out.push_str(&value.to_string());
                }
            } else if let Some(reg) = Register::from_word(field) {
                out.push_str(&self.registers.get(reg).to_string());
            } else {
                let value = self.read(&Slot::var(field))?;
                out.push_str(&value.to_string());
            }
            rest = tail;
        }
        out.push_str(rest);
        Ok(out)
    }

    // ── Devices ─────────────────────────────────────────────────────

    /// Sleep for `time`, or wait for its time of day. False if cancelled.
    fn time_wait(&self, ctx: &VmContext<'_>) -> bool {
        match self.registers.time_raw() {
            Value::At(patterns) => ctx.clock.wait_until(patterns, ctx.cancel),
            Value::Number(ms) if *ms > 0.0 => ctx.clock.pause_for(*ms, ctx.cancel),
            _ => !ctx.cancel.is_cancelled(),
        }
    }

    fn light_name(&self) -> Result<&str, RuntimeError> {
        let name = self.registers.name();
        name.as_str()
            .ok_or_else(|| RuntimeError::type_mismatch("light name", name))
    }

    fn members<'l>(&self, lights: &'l SortedLightSet) -> Result<&'l BTreeSet<String>, RuntimeError> {
        let operand = self.registers.operand();
        let name = self.light_name()?;
        let members = if operand == Operand::Location {
            lights.location(name)
        } else {
            lights.group(name)
        };
        members.ok_or_else(|| RuntimeError::unknown_set(operand, name))
    }

    /// Zone range from FIRST_ZONE and LAST_ZONE, end-exclusive.
    fn zones(&self) -> Result<(u32, u32), RuntimeError> {
        let first = zone_number(self.registers.first_zone())?;
        let last = match self.registers.last_zone() {
            v if v.is_null() => first,
            v => zone_number(v)?,
        };
        Ok((first, last.saturating_add(1)))
    }

    /// Body cells named by the row and column registers, moved below the top
    /// row. An unset axis spans the whole body; `None` if both are unset.
    fn body_rect(&self, matrix: &ColorMatrix) -> Result<Option<Rect>, RuntimeError> {
        let (first_row, last_row) = self.registers.rows();
        let (first_column, last_column) = self.registers.columns();
        let rows = cell_span(first_row, last_row)?;
        let columns = cell_span(first_column, last_column)?;
        if rows.is_none() && columns.is_none() {
            return Ok(None);
        }
        let (top, bottom) = rows.unwrap_or((0, matrix.height().saturating_sub(BODY_ROW + 1)));
        let (left, right) = columns.unwrap_or((0, matrix.width().saturating_sub(1)));
        Ok(Some(Rect::new(
            top.saturating_add(BODY_ROW),
            bottom.saturating_add(BODY_ROW),
            left,
            right,
        )))
    }

    /// Read the light's cells, paint the selected ones and write them back.
    fn paint_matrix(
        &self,
        ctx: &VmContext<'_>,
        color: Hsbk,
        duration: f64,
    ) -> Result<(), RuntimeError> {
        let name = self.light_name()?;
        let mut matrix = ctx.devices.get_matrix(name)?;
        let top = (self.registers.operand() == Operand::MatrixTop).then_some(TOP_CELL);
        for rect in top.into_iter().chain(self.body_rect(&matrix)?) {
            if !matrix.overlay(rect, color) {
                return Err(RuntimeError::CellsOutOfRange(name.to_string()));
            }
        }
        debug!(light = %name, %color, duration, "set matrix");
        ctx.devices.set_matrix(name, &matrix, duration)?;
        Ok(())
    }

    /// Send one command per addressee selected by NAME and OPERAND. Returns
    /// false if cancelled part way.
    fn dispatch(
        &self,
        ctx: &VmContext<'_>,
        mut send: impl FnMut(&dyn LightDevices, Addressee<'_>) -> Result<(), DeviceError>,
    ) -> Result<bool, RuntimeError> {
        match self.registers.operand() {
            Operand::All => send(ctx.devices, Addressee::Device(Target::All))?,
            Operand::Light => {
                let name = self.light_name()?;
                send(ctx.devices, Addressee::Device(Target::Light(name.to_string())))?;
            }
            Operand::MzLight => {
                let name = self.light_name()?;
                let (first, last) = self.zones()?;
                send(ctx.devices, Addressee::Zones(name, first, last))?;
            }
            Operand::Matrix | Operand::MatrixTop => {
                let name = self.light_name()?;
                send(ctx.devices, Addressee::Device(Target::Light(name.to_string())))?;
            }
            Operand::Group | Operand::Location => {
                for member in self.members(ctx.lights)? {
                    if ctx.cancel.is_cancelled() {
                        return Ok(false);
                    }
                    send(ctx.devices, Addressee::Device(Target::Light(member.clone())))?;
                }
            }
            Operand::Null => return Err(RuntimeError::NoTarget),
        }
        Ok(true)
    }

    /// Colour for `get`: a light's own, or the average over a set.
    fn fetch_color(&self, ctx: &VmContext<'_>) -> Result<Option<Hsbk>, RuntimeError> {
        let color = match self.registers.operand() {
            Operand::Light => Some(ctx.devices.get_color(self.light_name()?)?),
            Operand::MzLight => {
                let (first, _) = self.zones()?;
                let name = self.light_name()?;
                ctx.devices
                    .get_zone_colors(name, first, first.saturating_add(1))?
                    .first()
                    .copied()
            }
            Operand::Matrix | Operand::MatrixTop => {
                let name = self.light_name()?;
                let matrix = ctx.devices.get_matrix(name)?;
                let cell = match self.body_rect(&matrix)? {
                    Some(body) if self.registers.operand() == Operand::Matrix => body,
                    _ => TOP_CELL,
                };
                let color = matrix
                    .get(cell.top, cell.left)
                    .ok_or_else(|| RuntimeError::CellsOutOfRange(name.to_string()))?;
                Some(color)
            }
            Operand::All => average(ctx, ctx.lights.light_names())?,
            Operand::Group | Operand::Location => {
                average(ctx, self.members(ctx.lights)?.iter().map(String::as_str))?
            }
            Operand::Null => return Err(RuntimeError::NoTarget),
        };
        Ok(color)
    }
}

/// One concrete recipient of a device command.
enum Addressee<'a> {
    Device(Target),
    Zones(&'a str, u32, u32),
}

fn average<'n>(
    ctx: &VmContext<'_>,
    names: impl Iterator<Item = &'n str>,
) -> Result<Option<Hsbk>, RuntimeError> {
    let colors = names
        .map(|name| ctx.devices.get_color(name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Hsbk::average(colors))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn zone_number(value: &Value) -> Result<u32, RuntimeError> {
    let n = value
        .as_number()
        .ok_or_else(|| RuntimeError::type_mismatch("zone number", value))?;
    if !n.is_finite() || n < 0.0 || n > f64::from(u32::MAX) {
        return Err(RuntimeError::InvalidZone(n));
    }
    Ok(n as u32)
}

/// Inclusive bounds from a first/last register pair; `None` when unset.
fn cell_span(first: &Value, last: &Value) -> Result<Option<(usize, usize)>, RuntimeError> {
    if first.is_null() {
        return Ok(None);
    }
    let first = cell_number(first)?;
    let last = if last.is_null() { first } else { cell_number(last)? };
    Ok(Some((first, last)))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn cell_number(value: &Value) -> Result<usize, RuntimeError> {
    let n = value
        .as_number()
        .ok_or_else(|| RuntimeError::type_mismatch("row or column", value))?;
    if !n.is_finite() || n < 0.0 || n > f64::from(u32::MAX) {
        return Err(RuntimeError::InvalidCell(n));
    }
    Ok(n as usize)
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn jump_target(pc: usize, offset: i64, len: usize) -> Result<usize, RuntimeError> {
    let target = pc as i64 + offset;
    if target < 0 || target as usize > len {
        return Err(RuntimeError::JumpOutOfRange { from: pc, offset });
    }
    Ok(target as usize)
}
