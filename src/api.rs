use crate::{
    cloud_client::CloudServiceClient,
    commands::{self, find_command},
    context::AgentContext,
};
use actix_web::{HttpResponse, Responder, web};
use anyhow::Result;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Body of the command invocation surface: a named command plus its declared
/// parameters.
#[derive(Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

pub struct Api<C: CloudServiceClient> {
    pub ctx: Arc<AgentContext<C>>,
}

impl<C: CloudServiceClient> Clone for Api<C> {
    fn clone(&self) -> Self {
        Api {
            ctx: self.ctx.clone(),
        }
    }
}

impl<C: CloudServiceClient + 'static> Api<C> {
    /// Dispatch a named command to its handler.
    ///
    /// Unknown commands are ignored (204). A missing declared parameter is
    /// rejected (400) before any collaborator is touched. Handler failures
    /// are reported to the error sink and surfaced as hard 500s; nothing is
    /// silently suppressed.
    pub async fn command(body: web::Json<CommandRequest>, api: web::Data<Self>) -> impl Responder {
        debug!("command() called: {}", body.command);

        let Some(command) = find_command(&body.command) else {
            warn!("ignoring unsupported command: {}", body.command);
            return HttpResponse::NoContent().finish();
        };

        if let Some(missing) = command
            .required
            .iter()
            .find(|p| !body.parameters.contains_key(**p))
        {
            return HttpResponse::BadRequest().body(format!(
                "command {} requires parameter {missing}",
                command.name
            ));
        }

        let ctx = api.ctx.as_ref();

        match command.name {
            commands::VERIFY_CODE => {
                // Presence is validated above; the type still needs a check.
                let Some(code) = body.parameters.get("code").and_then(Value::as_str) else {
                    return HttpResponse::BadRequest().body("parameter code must be a string");
                };
                Self::respond(commands::verify_code(ctx, code).await, command.name, ctx)
            }
            commands::GET_PLUGIN_STATUS => {
                Self::respond(commands::plugin_status(ctx), command.name, ctx)
            }
            commands::TOGGLE_SENTRY_OPT => match commands::toggle_sentry_opt(ctx) {
                Ok(()) => HttpResponse::NoContent().finish(),
                Err(e) => Self::fail(e, command.name, ctx),
            },
            commands::TEST_SERVER_CONNECTION => {
                HttpResponse::Ok().json(commands::test_server_connection(ctx).await)
            }
            _ => unreachable!("command registry and dispatch disagree"),
        }
    }

    /// Registry listing: command name to its required parameter names.
    pub async fn commands() -> impl Responder {
        let listing: Map<String, Value> = commands::API_COMMANDS
            .iter()
            .map(|c| {
                let required = c.required.iter().map(|p| Value::from(*p)).collect();
                (c.name.to_string(), Value::Array(required))
            })
            .collect();

        HttpResponse::Ok().json(listing)
    }

    pub async fn version() -> impl Responder {
        HttpResponse::Ok().body(env!("CARGO_PKG_VERSION"))
    }

    fn respond<T: Serialize>(
        result: Result<T>,
        operation: &str,
        ctx: &AgentContext<C>,
    ) -> HttpResponse {
        match result {
            Ok(data) => HttpResponse::Ok().json(data),
            Err(e) => Self::fail(e, operation, ctx),
        }
    }

    /// Report to the error sink, then surface the failure to the caller.
    fn fail(e: anyhow::Error, operation: &str, ctx: &AgentContext<C>) -> HttpResponse {
        ctx.reporter().report(&e);
        error!("{operation} failed: {e:#}");
        HttpResponse::InternalServerError().body(e.to_string())
    }
}
