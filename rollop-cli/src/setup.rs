use rollop_core::{CallbackError, CallbackRegistry, LockError, RunContext};

/// Callbacks for nodes driven from the CLI. The operation itself is only
/// logged; `fail` makes every run report an error instead.
pub fn logging_callbacks(overrides: &[String], fail: bool) -> Result<CallbackRegistry, LockError> {
    let mut registry = CallbackRegistry::new(move |ctx: &RunContext| run(ctx, fail));
    for key in overrides {
        registry.register(key.as_str(), move |ctx: &RunContext| run(ctx, fail))?;
    }
    Ok(registry)
}

fn run(ctx: &RunContext, fail: bool) -> Result<(), CallbackError> {
    tracing::info!(
        name = %ctx.name,
        node = %ctx.node,
        callback_override = ?ctx.callback_override,
        "Running rolling operation"
    );
    if fail {
        return Err(CallbackError::new(format!("{} operation failed on {}", ctx.name, ctx.node)));
    }
    Ok(())
}
