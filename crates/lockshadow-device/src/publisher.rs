//! Report cycle task.
//!
//! Each pass reports the lock open, waits out the open window, then reports
//! it closed while overwriting the desired state. Every publish carries a
//! fresh client token and waits a bounded time for its acknowledgment; a
//! missing acknowledgment is logged and the pass goes on.

use std::pin::pin;

use lockshadow_core::{DeviceEvent, PacketId, ReportPhase, ShadowEngine, env::Environment};
use lockshadow_proto::ClientToken;
use tokio::sync::oneshot;

use crate::context::{DeviceContext, PublishRequest, ReportPorts};

/// How one publish of a pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The broker acknowledged it.
    Acked(PacketId),
    /// No acknowledgment within the timeout.
    TimedOut,
    /// It could not be sent.
    Failed(String),
}

/// Run report passes forever, one per trigger.
pub async fn run_publish_cycle<E: Environment>(context: DeviceContext<E>, mut ports: ReportPorts) {
    loop {
        context.report_trigger().notified().await;
        report_pass(&context, &mut ports).await;
    }
}

/// One full pass: every phase in order, with the dwell between them.
pub async fn report_pass<E: Environment>(
    context: &DeviceContext<E>,
    ports: &mut ReportPorts,
) -> Vec<PublishOutcome> {
    let config = context.config().report;
    tracing::info!("report pass started");

    let mut outcomes = Vec::with_capacity(ReportPhase::SEQUENCE.len());
    for phase in ReportPhase::SEQUENCE {
        outcomes.push(report_phase(context, ports, phase).await);
        if let Some(dwell) = phase.dwell_after(&config) {
            context.env().sleep(dwell).await;
        }
    }

    let requested = context.with_engine(ShadowEngine::take_pending_change);
    tracing::info!(requested_by_delta = requested, "report pass finished");
    outcomes
}

async fn report_phase<E: Environment>(
    context: &DeviceContext<E>,
    ports: &mut ReportPorts,
    phase: ReportPhase,
) -> PublishOutcome {
    let token = ClientToken::from_ticks(context.env().tick_count());
    let lock_state = phase.lock_state();
    context.with_engine(|engine| engine.set_lock_state(lock_state));

    let payload = match phase.document(token).to_payload() {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "could not encode report");
            return PublishOutcome::Failed(e.to_string());
        },
    };

    let outcome = publish_and_wait(context, ports, payload).await;
    match &outcome {
        PublishOutcome::Acked(packet_id) => {
            tracing::info!(%lock_state, %token, ?packet_id, "report acknowledged");
        },
        PublishOutcome::TimedOut => {
            tracing::warn!(%lock_state, %token, "no acknowledgment for report, moving on");
        },
        PublishOutcome::Failed(reason) => {
            tracing::error!(%lock_state, %token, %reason, "report not sent");
        },
    }
    outcome
}

async fn publish_and_wait<E: Environment>(
    context: &DeviceContext<E>,
    ports: &mut ReportPorts,
    payload: bytes::Bytes,
) -> PublishOutcome {
    // Only one publish is outstanding; anything queued belongs to an earlier
    // one that already timed out.
    while let Ok(stale) = ports.ack_rx.try_recv() {
        tracing::debug!(?stale, "discarding stale acknowledgment");
    }

    let (issued_tx, issued_rx) = oneshot::channel();
    let request =
        PublishRequest { topic: context.topics().update(), payload, issued: issued_tx };
    if ports.publish_tx.send(request).await.is_err() {
        return PublishOutcome::Failed("session task gone".to_string());
    }

    let mut deadline = pin!(context.env().sleep(context.config().report.ack_timeout));

    let packet_id = tokio::select! {
        biased;
        issued = issued_rx => match issued {
            Ok(Ok(packet_id)) => packet_id,
            Ok(Err(e)) => return PublishOutcome::Failed(e.to_string()),
            Err(_) => return PublishOutcome::Failed("session dropped the request".to_string()),
        },
        () = &mut deadline => return PublishOutcome::TimedOut,
    };

    loop {
        tokio::select! {
            biased;
            event = ports.ack_rx.recv() => match event {
                Some(DeviceEvent::PublishAcked { packet_id: acked }) if acked == packet_id => {
                    return PublishOutcome::Acked(acked);
                },
                Some(other) => tracing::debug!(?other, "acknowledgment for another publish"),
                None => return PublishOutcome::Failed("session task gone".to_string()),
            },
            () = &mut deadline => return PublishOutcome::TimedOut,
        }
    }
}
