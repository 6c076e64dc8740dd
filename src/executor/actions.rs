//! Leaf command side effects.
//!
//! Every function here returns a [`ControlFlow`] and never lets an error
//! escape: cancellation becomes `Stop`, service failures are logged and
//! become `Error`, image timeouts become `Stop`.

use super::automation::parse_key_combo;
use super::context::ExecutionContext;
use super::flow_control::ControlFlow;
use super::services::Point;
use crate::settings::{
    ClickImageSettings, ClickSettings, DEFAULT_POLL_INTERVAL_MS, ImageQuery, KeyInputSettings,
    SetVariableSettings, WaitImageSettings, WaitSettings,
};
use std::time::{Duration, Instant};

pub fn wait(settings: &WaitSettings, ctx: &mut ExecutionContext) -> ControlFlow {
    ctx.log(format!("Wait: Sleeping for {}ms", settings.duration_ms));
    match ctx.token.sleep(Duration::from_millis(settings.duration_ms)) {
        Ok(()) => ControlFlow::Next,
        Err(_) => {
            ctx.log("Wait: cancelled".to_string());
            ControlFlow::Stop
        }
    }
}

pub fn click(settings: &ClickSettings, ctx: &mut ExecutionContext) -> ControlFlow {
    ctx.log(format!(
        "Click: {:?} x{} at ({}, {})",
        settings.button, settings.click_count, settings.x, settings.y
    ));
    let result = ctx.services.input.click(
        settings.x,
        settings.y,
        settings.button,
        settings.click_count,
    );
    match result {
        Ok(()) => ControlFlow::Next,
        Err(e) => {
            ctx.warn(format!("Click: failed - {}", e));
            ControlFlow::Error
        }
    }
}

pub fn click_image(settings: &ClickImageSettings, ctx: &mut ExecutionContext) -> ControlFlow {
    ctx.log(format!(
        "ClickImage: {} threshold={} timeout={}ms",
        settings.image.path, settings.image.threshold, settings.timeout_ms
    ));
    let found = match poll_image(
        &settings.image,
        settings.timeout_ms,
        DEFAULT_POLL_INTERVAL_MS,
        true,
        ctx,
    ) {
        Ok(PollResult::Found(Some(point))) => point,
        Ok(_) => {
            ctx.log(format!("ClickImage: {} not found before timeout", settings.image.path));
            return ControlFlow::Stop;
        }
        Err(flow) => return flow,
    };

    let x = found.x + settings.offset_x;
    let y = found.y + settings.offset_y;
    ctx.log(format!("ClickImage: Found at ({}, {}), clicking ({}, {})", found.x, found.y, x, y));
    match ctx.services.input.click(x, y, settings.button, 1) {
        Ok(()) => ControlFlow::Next,
        Err(e) => {
            ctx.warn(format!("ClickImage: click failed - {}", e));
            ControlFlow::Error
        }
    }
}

pub fn key_input(settings: &KeyInputSettings, ctx: &mut ExecutionContext) -> ControlFlow {
    let keys = match parse_key_combo(&settings.keys) {
        Ok(keys) => keys,
        Err(unknown) => {
            ctx.warn(format!("KeyInput: unknown key '{}' in '{}'", unknown, settings.keys));
            return ControlFlow::Error;
        }
    };
    ctx.log(format!("KeyInput: {}", settings.keys));
    match ctx.services.input.press_keys(&keys) {
        Ok(()) => ControlFlow::Next,
        Err(e) => {
            ctx.warn(format!("KeyInput: failed - {}", e));
            ControlFlow::Error
        }
    }
}

pub fn set_variable(settings: &SetVariableSettings, ctx: &mut ExecutionContext) -> ControlFlow {
    ctx.log(format!("SetVariable: {} = {}", settings.name, settings.value));
    ctx.variables.set(&settings.name, settings.value.clone());
    ControlFlow::Next
}

/// WaitImageExist (`present == true`) or WaitImageNotExist.
pub fn wait_image(
    settings: &WaitImageSettings,
    present: bool,
    ctx: &mut ExecutionContext,
) -> ControlFlow {
    let label = if present { "WaitImageExist" } else { "WaitImageNotExist" };
    ctx.log(format!(
        "{}: {} timeout={}ms poll={}ms",
        label,
        settings.image.path,
        settings.timeout_ms,
        settings.effective_poll_interval_ms()
    ));
    match poll_image(
        &settings.image,
        settings.timeout_ms,
        settings.effective_poll_interval_ms(),
        present,
        ctx,
    ) {
        Ok(PollResult::Found(_)) => ControlFlow::Next,
        Ok(PollResult::TimedOut) => {
            ctx.log(format!("{}: timed out after {}ms", label, settings.timeout_ms));
            ControlFlow::Stop
        }
        Err(flow) => flow,
    }
}

/// One-shot search for IfImageExist.
pub fn image_exists(query: &ImageQuery, ctx: &mut ExecutionContext) -> Result<bool, ControlFlow> {
    match ctx.services.screen.find_image(query) {
        Ok(found) => {
            ctx.log(format!("IfImageExist: {} found={}", query.path, found.is_some()));
            Ok(found.is_some())
        }
        Err(e) => {
            ctx.warn(format!("IfImageExist: search failed - {}", e));
            Err(ControlFlow::Error)
        }
    }
}

enum PollResult {
    /// Condition met; carries the match position when waiting for presence.
    Found(Option<Point>),
    TimedOut,
}

/// Polls the screen until the image is present (or absent when `present` is
/// false). `timeout_ms == 0` waits forever.
fn poll_image(
    query: &ImageQuery,
    timeout_ms: u64,
    interval_ms: u64,
    present: bool,
    ctx: &mut ExecutionContext,
) -> Result<PollResult, ControlFlow> {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let interval = Duration::from_millis(interval_ms);

    loop {
        if ctx.token.is_cancelled() {
            return Err(ControlFlow::Stop);
        }
        let found = match ctx.services.screen.find_image(query) {
            Ok(found) => found,
            Err(e) => {
                ctx.warn(format!("Image search for {} failed - {}", query.path, e));
                return Err(ControlFlow::Error);
            }
        };
        if found.is_some() == present {
            return Ok(PollResult::Found(found));
        }

        let elapsed = start.elapsed();
        if timeout_ms != 0 && elapsed >= timeout {
            return Ok(PollResult::TimedOut);
        }
        let pause = if timeout_ms == 0 {
            interval
        } else {
            interval.min(timeout - elapsed)
        };
        ctx.token.sleep(pause).map_err(|_| ControlFlow::Stop)?;
    }
}
