//! Script-running helper for tests: compile, run against fakes, inspect.
#![allow(clippy::unwrap_used)]

use crate::clock::FakeClock;
use crate::device::{Action, FakeLights};
use crate::dsl::compile_source;
use crate::dsl::instruction::{Program, Value};
use crate::jobs::CancelToken;
use crate::model::{DiscoveredLight, Hsbk, SortedLightSet, UnitMode};
use crate::vm::{CapturedOutput, Machine, RunOutcome, RuntimeError, VmContext};

pub(crate) struct ScriptRun {
    pub lights: FakeLights,
    pub clock: FakeClock,
    pub output: CapturedOutput,
    pub machine: Machine,
    pub outcome: Result<RunOutcome, RuntimeError>,
}

impl ScriptRun {
    /// Colours sent to one light, oldest first.
    pub fn colors(&self, name: &str) -> Vec<Hsbk> {
        self.lights
            .calls(name)
            .into_iter()
            .filter_map(|call| match call {
                Action::SetColor { color, .. } => Some(color),
                _ => None,
            })
            .collect()
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.machine.variable(name)
    }

    pub fn printed(&self) -> String {
        self.output.contents()
    }
}

/// Compile and run `source` against the stock fake lights.
pub(crate) fn run_script(source: &str) -> ScriptRun {
    run_with(source, FakeLights::default_lights())
}

pub(crate) fn run_with(source: &str, inventory: Vec<DiscoveredLight>) -> ScriptRun {
    run_program(&compile_source(source).unwrap(), inventory)
}

/// Run hand-built code against the given inventory.
pub(crate) fn run_program(program: &Program, inventory: Vec<DiscoveredLight>) -> ScriptRun {
    let lights = FakeLights::new(inventory.clone());
    let set = SortedLightSet::from_discovered(inventory);
    let clock = FakeClock::new();
    let output = CapturedOutput::new();
    let cancel = CancelToken::new();
    let mut machine = Machine::new(UnitMode::Logical);
    let outcome = {
        let ctx = VmContext {
            devices: &lights,
            lights: &set,
            clock: &clock,
            output: &output,
            cancel: &cancel,
        };
        machine.run(program, &ctx)
    };
    ScriptRun {
        lights,
        clock,
        output,
        machine,
        outcome,
    }
}

/// Run `source` and require it to finish cleanly.
pub(crate) fn run_ok(source: &str) -> ScriptRun {
    let run = run_script(source);
    assert_eq!(run.outcome, Ok(RunOutcome::Completed), "{source}");
    run
}
