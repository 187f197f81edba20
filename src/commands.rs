//! Command registry and handlers, separated from the HTTP surface.

use crate::{
    alert_queue::Alert,
    cloud_client::{CloudServiceClient, LinkedPrinter},
    context::{AgentContext, CameraKind},
    settings::SentryOpt,
};
use anyhow::{Context, Result, bail};
use log::error;
use serde::Serialize;
use std::collections::BTreeMap;

/// A supported command and the parameters it requires.
pub struct ApiCommand {
    pub name: &'static str,
    pub required: &'static [&'static str],
}

pub const VERIFY_CODE: &str = "verify_code";
pub const GET_PLUGIN_STATUS: &str = "get_plugin_status";
pub const TOGGLE_SENTRY_OPT: &str = "toggle_sentry_opt";
pub const TEST_SERVER_CONNECTION: &str = "test_server_connection";

/// Every command the agent accepts. A name missing from this table is
/// ignored; a declared parameter missing from a request is rejected before
/// any handler runs.
pub const API_COMMANDS: &[ApiCommand] = &[
    ApiCommand {
        name: VERIFY_CODE,
        required: &["code"],
    },
    ApiCommand {
        name: GET_PLUGIN_STATUS,
        required: &[],
    },
    ApiCommand {
        name: TOGGLE_SENTRY_OPT,
        required: &[],
    },
    ApiCommand {
        name: TEST_SERVER_CONNECTION,
        required: &[],
    },
];

pub fn find_command(name: &str) -> Option<&'static ApiCommand> {
    API_COMMANDS.iter().find(|c| c.name == name)
}

#[derive(Debug, Serialize)]
pub struct VerifyCodeResponse {
    pub succeeded: bool,
    pub printer: Option<LinkedPrinter>,
}

#[derive(Debug, Serialize)]
pub struct ServerStatus {
    pub is_connected: bool,
    pub last_status_update_ts: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct StreamingStatus {
    pub is_pi_camera: bool,
    pub premium_streaming: bool,
}

/// One aggregated status snapshot, built fresh per request, never persisted.
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub server_status: ServerStatus,
    pub linked_printer: Option<LinkedPrinter>,
    pub streaming_status: StreamingStatus,
    pub error_stats: BTreeMap<String, u64>,
    pub alerts: Vec<Alert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentry_opt: Option<SentryOpt>,
}

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub status_code: Option<u16>,
}

/// Exchange a one-time verification code for a device auth token.
///
/// A rejecting server (expired or mistyped code) is a structured
/// `succeeded: false` outcome, not an error. Settings are written only after
/// the response parsed completely, so a failure half-way commits nothing.
pub async fn verify_code<C: CloudServiceClient>(
    ctx: &AgentContext<C>,
    code: &str,
) -> Result<VerifyCodeResponse> {
    let Some(cloud) = ctx.cloud() else {
        bail!("no cloud client configured");
    };

    let resp = cloud.verify_code(code).await?;

    if !resp.ok {
        return Ok(VerifyCodeResponse {
            succeeded: false,
            printer: None,
        });
    }

    let record = resp
        .body
        .get("printer")
        .cloned()
        .context("verification response is missing the printer record")?;
    let printer: LinkedPrinter =
        serde_json::from_value(record).context("failed to parse printer record")?;

    ctx.settings().set_auth_token(&printer.auth_token)?;
    ctx.set_linked_printer(printer.clone());

    Ok(VerifyCodeResponse {
        succeeded: true,
        printer: Some(printer),
    })
}

/// Aggregate one status snapshot from all providers.
///
/// Not a pure read, twice over: the alert group drains the queue, and when an
/// auth token is present while the stored sentry preference is still `out`,
/// the preference advances to `asked` (the opt-in prompt is shown once per
/// "out" period). The snapshot reports the pre-transition value. The
/// `sentry_opt` field is omitted entirely until a token exists, deferring the
/// prompt past onboarding.
pub fn plugin_status<C: CloudServiceClient>(ctx: &AgentContext<C>) -> Result<StatusSnapshot> {
    let session = ctx.session();
    let streamer = ctx.streamer();

    let mut sentry_opt = None;
    if ctx.settings().auth_token().is_some() {
        let opt = ctx.settings().sentry_opt();
        if opt == SentryOpt::Out {
            ctx.settings().set_sentry_opt(SentryOpt::Asked)?;
        }
        sentry_opt = Some(opt);
    }

    Ok(StatusSnapshot {
        server_status: ServerStatus {
            is_connected: session.is_some_and(|s| s.connected),
            last_status_update_ts: ctx.last_status_update_ts(),
        },
        linked_printer: ctx.linked_printer(),
        streaming_status: StreamingStatus {
            is_pi_camera: streamer.is_some_and(|s| s.camera == CameraKind::Pi),
            premium_streaming: streamer.is_some_and(|s| !s.shutting_down),
        },
        error_stats: ctx.error_stats().snapshot(),
        alerts: ctx.alerts().fetch_and_clear(),
        sentry_opt,
    })
}

/// Flip the sentry preference: `in` turns off, anything else (`out` or
/// `asked`) turns on. `asked` is absorbed into `in` on the first toggle and
/// is not restored by a second one.
pub fn toggle_sentry_opt<C: CloudServiceClient>(ctx: &AgentContext<C>) -> Result<()> {
    let next = match ctx.settings().sentry_opt() {
        SentryOpt::In => SentryOpt::Out,
        SentryOpt::Out | SentryOpt::Asked => SentryOpt::In,
    };
    ctx.settings().set_sentry_opt(next)
}

/// Probe cloud reachability. An unreachable server or an unconfigured client
/// yields `status_code: None`, never an error.
pub async fn test_server_connection<C: CloudServiceClient>(ctx: &AgentContext<C>) -> ProbeResponse {
    let status_code = match ctx.cloud() {
        Some(cloud) => match cloud.probe_status().await {
            Ok(code) => Some(code),
            Err(e) => {
                error!("server connection test failed: {e:#}");
                None
            }
        },
        None => None,
    };

    ProbeResponse { status_code }
}
