//! Step tracing for provisioning flows
//!
//! One [`TraceContext`] per flow. Each step opens a [`StepTrace`] under a child
//! span id and closes it with the step's outcome and duration.

use std::fmt::Display;
use std::time::{Duration, Instant};
use tracing::{info_span, Span};
use uuid::Uuid;

/// Ids correlating the log records of one flow
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
}

impl TraceContext {
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: None,
        }
    }

    /// Same trace, fresh span id, parented to this one
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: Some(self.span_id.clone()),
        }
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

/// An open step of a flow
pub struct StepTrace {
    step: &'static str,
    span: Span,
    start: Instant,
}

impl StepTrace {
    pub fn start(step: &'static str, ctx: &TraceContext) -> Self {
        let ids = ctx.child();
        let span = info_span!(
            "provision_step",
            step,
            trace_id = %ids.trace_id,
            span_id = %ids.span_id,
            parent_span_id = ?ids.parent_span_id
        );
        Self {
            step,
            span,
            start: Instant::now(),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Close the step, logging its duration and error if any
    pub fn finish<T, E: Display>(self, result: &Result<T, E>) -> Duration {
        let elapsed = self.start.elapsed();
        let duration_ms = elapsed.as_millis() as u64;
        match result {
            Ok(_) => tracing::info!(parent: &self.span, duration_ms, "{} completed", self.step),
            Err(e) => tracing::info!(
                parent: &self.span,
                duration_ms,
                error = %e,
                "{} failed",
                self.step
            ),
        }
        elapsed
    }
}

/// Step constructors carrying the step-specific fields
pub mod provision {
    use super::{StepTrace, TraceContext};
    use crate::core_identity::{DeviceId, KeyId};

    pub fn trace_step(step: &'static str, ctx: &TraceContext) -> StepTrace {
        StepTrace::start(step, ctx)
    }

    pub fn trace_keygen(ctx: &TraceContext, device_id: &DeviceId, is_eldest: bool) -> StepTrace {
        let op = StepTrace::start("provision.generate_keys", ctx);
        tracing::debug!(parent: op.span(), device_id = %device_id, is_eldest, "keygen");
        op
    }

    /// `signed_by` is the existing key authorizing the push; `None` for an eldest device
    pub fn trace_push(
        ctx: &TraceContext,
        device_id: &DeviceId,
        signed_by: Option<&KeyId>,
    ) -> StepTrace {
        let op = StepTrace::start("provision.push_keys", ctx);
        tracing::debug!(
            parent: op.span(),
            device_id = %device_id,
            signed_by = ?signed_by.map(|kid| kid.to_string()),
            "push"
        );
        op
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_context_keeps_trace_id() {
        let ctx = TraceContext::new();
        assert!(ctx.parent_span_id.is_none());

        let child = ctx.child();
        assert_eq!(child.trace_id, ctx.trace_id);
        assert_ne!(child.span_id, ctx.span_id);
        assert_eq!(child.parent_span_id, Some(ctx.span_id));
    }

    #[test]
    fn test_step_finish_reports_duration() {
        let ctx = TraceContext::new();
        let ok = provision::trace_step("provision.test", &ctx);
        std::thread::sleep(Duration::from_millis(2));
        assert!(ok.finish::<(), String>(&Ok(())) >= Duration::from_millis(2));

        let device_id = crate::core_identity::DeviceId::generate().unwrap();
        let failed = provision::trace_push(&ctx, &device_id, None);
        failed.finish::<(), _>(&Err("boom"));
    }
}
