use std::sync::{Arc, OnceLock};

use aws_config::BehaviorVersion;
use aws_types::SdkConfig;
use custom_resource::{run_guarded, CfnResponder, ExecutionContext, ResponseTarget};
use lambda_runtime::{run, service_fn, tracing, Error, LambdaEvent};
use reqwest::Client as HttpClient;
use serde_json::Value;

mod config;
mod diff;
mod iam;
mod metadata;
mod source;
mod ssm;
mod sync;
#[cfg(test)]
mod test_support;

struct ClientHandler {
    ssm: ssm::SsmConfigStore,
    iam: iam::IamRegistry,
    http: source::HttpMetadataSource,
    responder: Arc<CfnResponder>,
}

impl ClientHandler {
    pub fn new(config: &SdkConfig) -> Self {
        let http = HttpClient::new();
        Self {
            ssm: ssm::SsmConfigStore::new(config),
            iam: iam::IamRegistry::new(config),
            http: source::HttpMetadataSource::new(http.clone()),
            responder: Arc::new(CfnResponder::new(http)),
        }
    }
}

static CLIENTS: OnceLock<ClientHandler> = OnceLock::new();

async fn clients() -> &'static ClientHandler {
    if let Some(clients) = CLIENTS.get() {
        return clients;
    }
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    CLIENTS.get_or_init(|| ClientHandler::new(&config))
}

// Also runs on schedules and manual invocations; only CloudFormation
// requests carry a ResponseURL and get a status report.
async fn handler(event: LambdaEvent<Value>) -> Result<(), Error> {
    let (payload, ctx) = event.into_parts();
    tracing::info!("received event: {payload}");

    let target = ResponseTarget::from_payload(&payload, &ctx);
    let clients = clients().await;
    let completion = run_guarded(
        ctx.remaining_time(),
        target,
        clients.responder.clone(),
        sync::run(
            config::Config::from_env(),
            &clients.ssm,
            &clients.http,
            &clients.iam,
        ),
    )
    .await;
    tracing::info!("invocation finished: {completion:?}");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();
    run(service_fn(handler)).await?;

    Ok(())
}
