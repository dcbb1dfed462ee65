use async_trait::async_trait;
use custom_resource::Error;
use lambda_runtime::tracing;

use crate::config::{Config, Parameter, SyncEntry};
use crate::{diff, metadata, source};

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn parameters_by_path(&self, path: &str) -> Result<Vec<Parameter>, Error>;
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, Error>;
}

#[async_trait]
pub trait ProviderRegistry: Send + Sync {
    async fn provider_arns(&self) -> Result<Vec<String>, Error>;
    async fn metadata_document(&self, arn: &str) -> Result<String, Error>;
    async fn create_provider(&self, name: &str, document: &str) -> Result<(), Error>;
    async fn update_provider(&self, arn: &str, document: &str) -> Result<(), Error>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    DoesNotExist,
    Existing { arn: String, document: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Unchanged,
    Created,
    Updated,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub unchanged: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl SyncSummary {
    fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Unchanged => self.unchanged += 1,
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Updated => self.updated += 1,
        }
    }
}

/// Syncs every entry under `prefix`.
///
/// Only failing to list the configuration is an error; per-entry failures
/// are logged and counted in the summary.
pub async fn sync_all(
    prefix: &str,
    config: &dyn ConfigStore,
    source: &dyn MetadataSource,
    registry: &dyn ProviderRegistry,
) -> anyhow::Result<SyncSummary> {
    let parameters = config.parameters_by_path(prefix).await?;
    tracing::info!("found {} SAML parameters under {prefix}", parameters.len());

    let mut summary = SyncSummary::default();
    for parameter in &parameters {
        let result = match SyncEntry::from_parameter(parameter) {
            Ok(entry) => sync_entry(&entry, source, registry).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => summary.record(outcome),
            Err(e) => {
                tracing::error!(
                    "parameter {}: {:#}",
                    parameter.name,
                    anyhow::Error::from(e)
                );
                summary.failed += 1;
            }
        }
    }

    tracing::info!("SAML sync finished: {summary:?}");
    Ok(summary)
}

/// Runs a sync for a loaded configuration. A configuration error fails the
/// run before any listing.
pub async fn run(
    config: anyhow::Result<Config>,
    store: &dyn ConfigStore,
    source: &dyn MetadataSource,
    registry: &dyn ProviderRegistry,
) -> anyhow::Result<()> {
    let config = config?;
    sync_all(&config.parameter_prefix, store, source, registry).await?;

    Ok(())
}

pub async fn sync_entry(
    entry: &SyncEntry,
    source: &dyn MetadataSource,
    registry: &dyn ProviderRegistry,
) -> Result<SyncOutcome, Error> {
    let document = source::load(entry, source).await?;
    let destination = find_destination(entry, registry).await?;

    if !requires_update(entry, &document, &destination)? {
        tracing::info!("{entry}: metadata source and destination match, skipping update");
        return Ok(SyncOutcome::Unchanged);
    }

    tracing::info!("{entry}: destination needs update, updating now");
    match destination {
        Destination::DoesNotExist => {
            registry
                .create_provider(&entry.destination, &document)
                .await?;
            tracing::info!("{entry}: created SAML provider {}", entry.destination);
            Ok(SyncOutcome::Created)
        }
        Destination::Existing { arn, .. } => {
            registry.update_provider(&arn, &document).await?;
            tracing::info!("{entry}: updated SAML provider {arn}");
            Ok(SyncOutcome::Updated)
        }
    }
}

async fn find_destination(
    entry: &SyncEntry,
    registry: &dyn ProviderRegistry,
) -> Result<Destination, Error> {
    let suffix = format!("/{}", entry.destination);
    let mut matching: Vec<String> = registry
        .provider_arns()
        .await?
        .into_iter()
        .filter(|arn| arn.ends_with(&suffix))
        .collect();

    match matching.len() {
        0 => Ok(Destination::DoesNotExist),
        1 => {
            let arn = matching.remove(0);
            let document = registry.metadata_document(&arn).await?;
            Ok(Destination::Existing { arn, document })
        }
        count => Err(Error::AmbiguousDestination {
            name: entry.name.clone(),
            destination: entry.destination.clone(),
            count,
        }),
    }
}

/// Whether `destination` has to be rewritten to match `source`.
///
/// Dynamic signature fields and sibling order are ignored. A destination
/// that no longer parses is always rewritten.
pub fn requires_update(
    entry: &SyncEntry,
    source: &str,
    destination: &Destination,
) -> Result<bool, Error> {
    let Destination::Existing { document, .. } = destination else {
        return Ok(true);
    };

    let source = metadata::parse_normalized(source).map_err(|e| Error::MalformedSource {
        name: entry.name.clone(),
        reason: e.to_string(),
    })?;
    let destination = match metadata::parse_normalized(document) {
        Ok(destination) => destination,
        Err(e) => {
            tracing::warn!("{entry}: destination metadata does not parse: {e}");
            return Ok(true);
        }
    };

    let edits: Vec<_> = diff::diff(&source, &destination)
        .into_iter()
        .filter(|edit| !edit.is_move())
        .collect();
    for edit in &edits {
        tracing::info!("{entry}: {edit}");
    }

    Ok(!edits.is_empty())
}
