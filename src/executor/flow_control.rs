//! Flow control and execution logic for command trees.
//!
//! This module dispatches every command kind and implements the block,
//! If and Loop semantics. Leaf side effects live in `actions.rs`.
//!
//! Control flow values travel upward: a block stops at the first non-`Next`
//! result, a Loop absorbs `Break` and `Continue`, and `Stop`/`Error` reach
//! the macro root unchanged.

use super::actions;
use super::conditions::{Expression, evaluate_if_variable};
use super::context::ExecutionContext;
use super::events::ExecutionEvent;
use crate::graph::{CommandKind, CommandNode, MacroScript};
use crate::node_types::{BLOCK_BODY, BLOCK_ELSE, BLOCK_THEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    /// Continue with the next sibling.
    Next,
    /// Leave the innermost loop.
    Break,
    /// Skip to the next iteration of the innermost loop.
    Continue,
    /// Abort the macro (cancellation, timeout).
    Stop,
    /// Abort the macro after an unexpected failure.
    Error,
}

impl ControlFlow {
    pub fn is_abort(self) -> bool {
        matches!(self, ControlFlow::Stop | ControlFlow::Error)
    }
}

/// Execute a single node. Disabled nodes are skipped without side effects.
pub fn execute_node(node: &CommandNode, ctx: &mut ExecutionContext) -> ControlFlow {
    if !node.enabled {
        return ControlFlow::Next;
    }
    if ctx.token.is_cancelled() {
        return ControlFlow::Stop;
    }

    ctx.emit(ExecutionEvent::NodeActive(node.id));
    let flow = match &node.kind {
        CommandKind::Wait(s) => actions::wait(s, ctx),
        CommandKind::Click(s) => actions::click(s, ctx),
        CommandKind::ClickImage(s) => actions::click_image(s, ctx),
        CommandKind::KeyInput(s) => actions::key_input(s, ctx),
        CommandKind::SetVariable(s) => actions::set_variable(s, ctx),
        CommandKind::WaitImageExist(s) => actions::wait_image(s, true, ctx),
        CommandKind::WaitImageNotExist(s) => actions::wait_image(s, false, ctx),
        CommandKind::If(s) => {
            let condition = Expression::parse(&s.condition)
                .and_then(|expr| expr.evaluate(&ctx.variables));
            match condition {
                Ok(value) => {
                    ctx.log(format!("If: '{}' is {}", s.condition, value));
                    execute_if(value, node, ctx)
                }
                Err(e) => {
                    ctx.warn(format!("If: '{}' failed: {}", s.condition, e));
                    ControlFlow::Error
                }
            }
        }
        CommandKind::IfVariable(s) => match evaluate_if_variable(s, &ctx.variables) {
            Ok(value) => {
                ctx.log(format!(
                    "IfVariable: {} {:?} '{}' is {}",
                    s.name, s.operator, s.value, value
                ));
                execute_if(value, node, ctx)
            }
            Err(e) => {
                ctx.warn(format!("IfVariable: {}", e));
                ControlFlow::Error
            }
        },
        CommandKind::IfImageExist(s) => match actions::image_exists(&s.image, ctx) {
            Ok(value) => execute_if(value, node, ctx),
            Err(flow) => flow,
        },
        CommandKind::Loop(s) => execute_loop(s.loop_count, node.children(BLOCK_BODY), ctx),
        CommandKind::Break => ControlFlow::Break,
        CommandKind::Continue => ControlFlow::Continue,
    };
    ctx.emit(ExecutionEvent::NodeInactive(node.id));
    flow
}

/// Run `nodes` in order, returning the first non-`Next` result.
pub fn execute_block(nodes: &[CommandNode], ctx: &mut ExecutionContext) -> ControlFlow {
    for node in nodes {
        let flow = execute_node(node, ctx);
        if flow != ControlFlow::Next {
            return flow;
        }
    }
    ControlFlow::Next
}

/// Run the Then or Else block of `node`.
pub fn execute_if(condition: bool, node: &CommandNode, ctx: &mut ExecutionContext) -> ControlFlow {
    let block = if condition { BLOCK_THEN } else { BLOCK_ELSE };
    execute_block(node.children(block), ctx)
}

/// Run `body` `count` times. Cancellation is checked before every iteration.
pub fn execute_loop(count: u32, body: &[CommandNode], ctx: &mut ExecutionContext) -> ControlFlow {
    for iteration in 0..count {
        if ctx.token.is_cancelled() {
            ctx.log(format!("Loop: cancelled before iteration {}", iteration + 1));
            return ControlFlow::Stop;
        }
        match execute_block(body, ctx) {
            ControlFlow::Next | ControlFlow::Continue => {}
            ControlFlow::Break => return ControlFlow::Next,
            flow @ (ControlFlow::Stop | ControlFlow::Error) => return flow,
        }
    }
    ControlFlow::Next
}

/// The macro root behaves as a single-iteration loop over the script.
pub fn execute_root(script: &MacroScript, ctx: &mut ExecutionContext) -> ControlFlow {
    execute_loop(1, &script.commands, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{Call, FakeServices};
    use crate::graph::Value;
    use crate::settings::*;
    use std::time::Duration;

    fn set(name: &str, value: f64) -> CommandNode {
        CommandNode::new(CommandKind::SetVariable(SetVariableSettings {
            name: name.into(),
            value: Value::Number(value),
        }))
    }

    fn click(x: i32) -> CommandNode {
        CommandNode::new(CommandKind::Click(ClickSettings {
            x,
            y: 0,
            ..Default::default()
        }))
    }

    fn looped(count: u32, body: Vec<CommandNode>) -> CommandNode {
        let mut node = CommandNode::new(CommandKind::Loop(LoopSettings { loop_count: count }));
        node.block_mut(BLOCK_BODY).unwrap().nodes = body;
        node
    }

    fn if_expr(condition: &str, then: Vec<CommandNode>, otherwise: Vec<CommandNode>) -> CommandNode {
        let mut node = CommandNode::new(CommandKind::If(IfSettings {
            condition: condition.into(),
        }));
        node.block_mut(BLOCK_THEN).unwrap().nodes = then;
        node.block_mut(BLOCK_ELSE).unwrap().nodes = otherwise;
        node
    }

    fn brk() -> CommandNode {
        CommandNode::new(CommandKind::Break)
    }

    #[test]
    fn loop_runs_body_exactly_count_times() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        let node = looped(4, vec![click(1), click(2)]);

        assert_eq!(execute_node(&node, &mut ctx), ControlFlow::Next);
        assert_eq!(fake.calls().len(), 8);
    }

    #[test]
    fn zero_count_loop_skips_body() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        assert_eq!(execute_node(&looped(0, vec![click(1)]), &mut ctx), ControlFlow::Next);
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn break_ends_loop_and_skips_remaining_siblings() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        let node = looped(10, vec![click(1), brk(), click(2)]);

        assert_eq!(execute_node(&node, &mut ctx), ControlFlow::Next);
        assert_eq!(fake.calls(), vec![Call::Click(1, 0)]);
    }

    #[test]
    fn break_inside_if_leaves_enclosing_loop() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        let node = looped(
            5,
            vec![
                click(7),
                if_expr("$flag == 1", vec![brk()], vec![]),
                set("flag", 1.0),
            ],
        );
        ctx.variables.set("flag", Value::Number(0.0));

        assert_eq!(execute_node(&node, &mut ctx), ControlFlow::Next);
        assert_eq!(fake.calls(), vec![Call::Click(7, 0), Call::Click(7, 0)]);
    }

    #[test]
    fn nested_break_only_leaves_inner_loop() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        let node = looped(3, vec![looped(5, vec![click(1), brk()]), click(2)]);

        assert_eq!(execute_node(&node, &mut ctx), ControlFlow::Next);
        assert_eq!(fake.calls().len(), 6);
    }

    #[test]
    fn continue_skips_rest_of_iteration_only() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        let node = looped(
            3,
            vec![
                click(1),
                if_expr("true", vec![CommandNode::new(CommandKind::Continue)], vec![]),
                click(2),
            ],
        );

        assert_eq!(execute_node(&node, &mut ctx), ControlFlow::Next);
        assert_eq!(fake.calls(), vec![Call::Click(1, 0); 3]);
    }

    #[test]
    fn image_timeout_stop_propagates_to_root() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        let missing = CommandNode::new(CommandKind::ClickImage(ClickImageSettings {
            timeout_ms: 60,
            ..Default::default()
        }));
        let mut script = MacroScript::new("stops");
        script.commands = vec![
            looped(
                3,
                vec![click(1), if_expr("true", vec![missing, click(2)], vec![]), click(3)],
            ),
            click(9),
        ];

        assert_eq!(execute_root(&script, &mut ctx), ControlFlow::Stop);
        // Neither the loop nor the root absorbed the Stop
        assert_eq!(fake.calls(), vec![Call::Click(1, 0)]);
        assert!(fake.searches() >= 1);
    }

    #[test]
    fn error_propagates_to_root() {
        let fake = FakeServices::new();
        fake.fail_clicks();
        let mut ctx = fake.context();
        let mut script = MacroScript::new("errors");
        script.commands = vec![looped(3, vec![if_expr("true", vec![click(1)], vec![])]), click(9)];

        assert_eq!(execute_root(&script, &mut ctx), ControlFlow::Error);
        // The failing click aborted everything after it
        assert_eq!(fake.calls(), vec![Call::Click(1, 0)]);
    }

    #[test]
    fn condition_errors_abort_the_run() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        let node = if_expr("$missing > 2", vec![click(1)], vec![click(2)]);
        assert_eq!(execute_node(&node, &mut ctx), ControlFlow::Error);
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn if_variable_picks_branch() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        ctx.variables.set("count", Value::String("10".into()));
        let mut node = CommandNode::new(CommandKind::IfVariable(IfVariableSettings {
            name: "COUNT".into(),
            operator: crate::executor::conditions::CompareOperator::GreaterThan,
            value: "5".into(),
        }));
        node.block_mut(BLOCK_THEN).unwrap().nodes.push(click(1));
        node.block_mut(BLOCK_ELSE).unwrap().nodes.push(click(2));

        assert_eq!(execute_node(&node, &mut ctx), ControlFlow::Next);
        assert_eq!(fake.calls(), vec![Call::Click(1, 0)]);
    }

    #[test]
    fn disabled_nodes_have_no_side_effects() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        let nodes = vec![
            click(1).disabled(),
            brk().disabled(),
            CommandNode::new(CommandKind::Continue).disabled(),
            looped(3, vec![click(2)]).disabled(),
            set("x", 1.0).disabled(),
            CommandNode::new(CommandKind::Wait(WaitSettings { duration_ms: 10_000 })).disabled(),
        ];
        assert_eq!(execute_block(&nodes, &mut ctx), ControlFlow::Next);
        assert!(fake.calls().is_empty());
        assert!(!ctx.variables.contains("x"));
    }

    #[test]
    fn break_at_root_ends_macro_normally() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        let mut script = MacroScript::new("root");
        script.commands = vec![click(1), brk(), click(2)];
        assert_eq!(execute_root(&script, &mut ctx), ControlFlow::Next);
        assert_eq!(fake.calls(), vec![Call::Click(1, 0)]);
    }

    #[test]
    fn cancellation_before_iteration_is_stop() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        ctx.token.cancel();
        assert_eq!(execute_loop(3, &[click(1)], &mut ctx), ControlFlow::Stop);
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn cancel_during_wait_inside_loop_stops_everything() {
        let fake = FakeServices::new();
        let mut ctx = fake.context();
        let token = ctx.token.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            token.cancel();
        });
        let node = looped(
            100,
            vec![
                CommandNode::new(CommandKind::Wait(WaitSettings { duration_ms: 20 })),
                click(1),
            ],
        );
        assert_eq!(execute_node(&node, &mut ctx), ControlFlow::Stop);
        canceller.join().unwrap();
        assert!(fake.calls().len() < 100);
    }
}
