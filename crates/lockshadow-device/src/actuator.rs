//! Actuator handshake task.

use lockshadow_core::{ActuatorError, LockActuator, env::Environment};

use crate::context::DeviceContext;

/// Run handshakes forever, one per wake.
///
/// Wakes that arrive during a handshake collapse into at most one more.
pub async fn run_actuator<E, A>(context: DeviceContext<E>, mut actuator: A)
where
    E: Environment,
    A: LockActuator,
{
    loop {
        context.actuator_wake().notified().await;
        match handshake(&context, &mut actuator).await {
            Ok(()) => context.report_trigger().notify_one(),
            Err(e) => {
                tracing::error!(error = %e, "lock handshake failed");
                release(&mut actuator);
            },
        }
    }
}

/// Hold the lock open for the configured dwell, then close it.
///
/// # Errors
///
/// Returns the first line write that failed. Lines already asserted stay
/// asserted; the caller releases them.
pub async fn handshake<E, A>(
    context: &DeviceContext<E>,
    actuator: &mut A,
) -> Result<(), ActuatorError>
where
    E: Environment,
    A: LockActuator,
{
    tracing::info!("opening lock");
    actuator.set_lock(true)?;
    actuator.set_indicator(true)?;

    context.env().sleep(context.config().actuator.dwell).await;

    actuator.set_lock(false)?;
    actuator.set_indicator(false)?;
    tracing::info!("lock closed");
    Ok(())
}

/// Best effort to leave both lines low after a failed handshake.
fn release<A: LockActuator>(actuator: &mut A) {
    if let Err(e) = actuator.set_lock(false) {
        tracing::error!(error = %e, "could not release lock line");
    }
    if let Err(e) = actuator.set_indicator(false) {
        tracing::warn!(error = %e, "could not clear indicator");
    }
}
