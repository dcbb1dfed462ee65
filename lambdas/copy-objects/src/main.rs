use std::sync::{Arc, OnceLock};

use aws_config::BehaviorVersion;
use aws_types::SdkConfig;
use custom_resource::{run_guarded, CfnResponder, ExecutionContext, ResponseTarget};
use lambda_runtime::{run, service_fn, tracing, Error, LambdaEvent};
use reqwest::Client as HttpClient;
use serde_json::Value;

mod copier;
mod fetch;
mod s3;

struct ClientHandler {
    store: s3::S3Store,
    fetcher: fetch::HttpFetcher,
    responder: Arc<CfnResponder>,
}

impl ClientHandler {
    pub fn new(config: &SdkConfig) -> Self {
        let http = HttpClient::new();
        Self {
            store: s3::S3Store::new(config),
            fetcher: fetch::HttpFetcher::new(http.clone()),
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

// Takes the raw payload so a malformed event is still answered with FAILED.
async fn handler(event: LambdaEvent<Value>) -> Result<(), Error> {
    let (payload, ctx) = event.into_parts();
    tracing::info!("received event: {payload}");

    let target = ResponseTarget::from_payload(&payload, &ctx);
    let clients = clients().await;
    let completion = run_guarded(
        ctx.remaining_time(),
        target,
        clients.responder.clone(),
        copier::handle_event(payload, &clients.fetcher, &clients.store),
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
