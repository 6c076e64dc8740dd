pub mod actions;
pub mod automation;
pub mod conditions;
pub mod context;
pub mod events;
pub mod flow_control;
pub mod image_matching;
pub mod services;
pub mod type_conversions;
pub mod variables;

#[cfg(test)]
pub mod testing;

use crate::graph::{MacroScript, Value};
use crate::registry::CommandRegistry;
use context::{CancellationToken, ExecutionContext};
use events::ExecutionEvent;
use flow_control::ControlFlow;
use services::Services;
use std::collections::BTreeMap;
use std::sync::mpsc::{Receiver, channel};
use std::thread;
use std::time::{Duration, Instant};
use variables::VariableScope;

/// Outcome of one macro run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: ControlFlow,
    pub elapsed: Duration,
    /// Variable scope at the end of the run, keyed by display name.
    pub variables: BTreeMap<String, Value>,
}

impl RunReport {
    /// Break and Continue at the root still count as a clean finish.
    pub fn succeeded(&self) -> bool {
        !self.outcome.is_abort()
    }
}

pub struct Interpreter;

impl Interpreter {
    /// Runs `script` on the calling thread against the built-in registry.
    pub fn run(script: &MacroScript, ctx: &mut ExecutionContext) -> RunReport {
        Self::run_with_registry(script, &CommandRegistry::builtin(), ctx)
    }

    /// Runs `script` on the calling thread.
    ///
    /// Settings and block slots are validated against `registry` first; an
    /// invalid script never touches the input devices and reports `Error`.
    pub fn run_with_registry(
        script: &MacroScript,
        registry: &CommandRegistry,
        ctx: &mut ExecutionContext,
    ) -> RunReport {
        let start = Instant::now();
        let problems = registry.validate_script(script);

        let outcome = if problems.is_empty() {
            ctx.log(format!(
                "Running '{}' ({} commands)",
                script.name,
                script.node_count()
            ));
            flow_control::execute_root(script, ctx)
        } else {
            for problem in &problems {
                ctx.warn(format!("Invalid command {}", problem));
            }
            ControlFlow::Error
        };

        let elapsed = start.elapsed();
        match outcome {
            ControlFlow::Stop => ctx.log(format!("Execution stopped after {:?}", elapsed)),
            ControlFlow::Error => ctx.warn(format!("Execution failed after {:?}", elapsed)),
            _ => ctx.log(format!("Execution finished in {:?}", elapsed)),
        }
        ctx.emit(ExecutionEvent::Finished(outcome));

        RunReport {
            outcome,
            elapsed,
            variables: ctx.variables.snapshot(),
        }
    }

    /// Runs `script` on a worker thread.
    ///
    /// Services are built on the worker so device handles never cross threads.
    /// Returns the event stream and a token that stops the run. The stream
    /// ends with [`ExecutionEvent::Finished`].
    pub fn run_async_with_stop<F>(
        script: &MacroScript,
        make_services: F,
        variables: VariableScope,
    ) -> (Receiver<ExecutionEvent>, CancellationToken)
    where
        F: FnOnce() -> Services + Send + 'static,
    {
        Self::run_async_with_registry(script, CommandRegistry::builtin(), make_services, variables)
    }

    /// [`Interpreter::run_async_with_stop`] validating against `registry`.
    pub fn run_async_with_registry<F>(
        script: &MacroScript,
        registry: CommandRegistry,
        make_services: F,
        variables: VariableScope,
    ) -> (Receiver<ExecutionEvent>, CancellationToken)
    where
        F: FnOnce() -> Services + Send + 'static,
    {
        let (tx, rx) = channel();
        let token = CancellationToken::new();
        let script = script.clone();
        let worker_token = token.clone();

        thread::spawn(move || {
            let mut ctx = ExecutionContext::new(make_services())
                .with_token(worker_token)
                .with_variables(variables)
                .with_events(tx);
            Self::run_with_registry(&script, &registry, &mut ctx);
        });

        (rx, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CommandKind, CommandNode};
    use crate::node_types::BLOCK_BODY;
    use crate::settings::*;
    use testing::FakeServices;

    fn counting_script(iterations: u32) -> MacroScript {
        let increment = CommandNode::new(CommandKind::SetVariable(SetVariableSettings {
            name: "ticks".into(),
            value: Value::Number(1.0),
        }));
        let looped = CommandNode::new(CommandKind::Loop(LoopSettings {
            loop_count: iterations,
        }))
        .push_child(BLOCK_BODY, increment)
        .push_child(
            BLOCK_BODY,
            CommandNode::new(CommandKind::Wait(WaitSettings { duration_ms: 0 })),
        );
        let mut script = MacroScript::new("counting");
        script.commands.push(looped);
        script
    }

    #[test]
    fn run_reports_outcome_and_variables() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        let report = Interpreter::run(&counting_script(3), &mut ctx);
        assert_eq!(report.outcome, ControlFlow::Next);
        assert!(report.succeeded());
        assert_eq!(report.variables.get("ticks"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn invalid_script_is_rejected_before_running() {
        let fake = FakeServices::new();
        let mut script = MacroScript::new("bad");
        script.commands.push(CommandNode::new(CommandKind::Click(ClickSettings {
            x: 5,
            y: 5,
            button: MouseButton::Left,
            click_count: 9,
        })));
        let mut ctx = fake.context();
        let report = Interpreter::run(&script, &mut ctx);
        assert_eq!(report.outcome, ControlFlow::Error);
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn run_validates_against_the_given_registry() {
        use crate::registry::{BlockSlot, CommandDescriptor};
        use crate::node_types::CommandType;

        const NON_EMPTY: &[BlockSlot] = &[BlockSlot {
            name: BLOCK_BODY,
            min_children: 1,
            max_children: None,
            allow_empty: false,
        }];
        let mut strict = CommandRegistry::builtin();
        strict.register(CommandDescriptor::new(CommandType::Loop, NON_EMPTY, |v| {
            Ok(CommandKind::Loop(serde_json::from_value(v)?))
        }));

        let mut script = MacroScript::new("empty loop");
        script.commands.push(CommandNode::new(CommandKind::Loop(LoopSettings { loop_count: 2 })));

        let fake = FakeServices::new();
        let report = Interpreter::run_with_registry(&script, &strict, &mut fake.context());
        assert_eq!(report.outcome, ControlFlow::Error);

        let report = Interpreter::run(&script, &mut fake.context());
        assert_eq!(report.outcome, ControlFlow::Next);

        let (rx, _token) = Interpreter::run_async_with_registry(
            &script,
            strict,
            move || fake.services(),
            VariableScope::new(),
        );
        let finished = rx.iter().find_map(|e| match e {
            ExecutionEvent::Finished(flow) => Some(flow),
            _ => None,
        });
        assert_eq!(finished, Some(ControlFlow::Error));
    }

    #[test]
    fn async_run_streams_events_and_finishes() {
        let fake = FakeServices::new();
        let (rx, _token) = Interpreter::run_async_with_stop(
            &counting_script(2),
            move || fake.services(),
            VariableScope::new(),
        );

        let events: Vec<ExecutionEvent> = rx.iter().collect();
        assert!(matches!(
            events.last(),
            Some(ExecutionEvent::Finished(ControlFlow::Next))
        ));
        let activations = events
            .iter()
            .filter(|e| matches!(e, ExecutionEvent::NodeActive(_)))
            .count();
        // Loop once, then two children per iteration
        assert_eq!(activations, 5);
    }

    #[test]
    fn async_run_stops_on_request() {
        let fake = FakeServices::new();
        let mut script = MacroScript::new("long");
        script.commands.push(CommandNode::new(CommandKind::Wait(WaitSettings {
            duration_ms: 60_000,
        })));

        let start = Instant::now();
        let (rx, token) =
            Interpreter::run_async_with_stop(&script, move || fake.services(), VariableScope::new());
        thread::sleep(Duration::from_millis(50));
        token.cancel();

        let finished = rx
            .iter()
            .find_map(|e| match e {
                ExecutionEvent::Finished(flow) => Some(flow),
                _ => None,
            });
        assert_eq!(finished, Some(ControlFlow::Stop));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
