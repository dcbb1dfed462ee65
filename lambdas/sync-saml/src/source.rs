use std::sync::OnceLock;

use async_trait::async_trait;
use custom_resource::Error;
use regex::{Captures, Regex};
use reqwest::Client;

use crate::config::SyncEntry;
use crate::sync::MetadataSource;

fn entity_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(<(?:[\w.-]+:)?EntityDescriptor[^>]+entityID=")([^"]+)(")"#)
            .expect("entity id pattern is valid")
    })
}

pub fn entity_id(document: &str) -> Option<&str> {
    entity_id_pattern()
        .captures(document)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
}

/// Appends `suffix` to the descriptor's entity ID, leaving every other byte
/// of the document untouched.
pub fn append_entity_id_suffix(document: &str, suffix: &str) -> String {
    entity_id_pattern()
        .replace_all(document, |caps: &Captures<'_>| {
            format!("{}{}{suffix}{}", &caps[1], &caps[2], &caps[3])
        })
        .into_owned()
}

/// Fetches the entry's source document with its entity ID suffix applied.
pub async fn load(entry: &SyncEntry, source: &dyn MetadataSource) -> Result<String, Error> {
    let document = source.fetch_text(&entry.source_url).await?;
    if entity_id(&document).is_none() {
        return Err(Error::MalformedSource {
            name: entry.name.clone(),
            reason: "no EntityDescriptor entityID".into(),
        });
    }

    Ok(match &entry.entity_id_suffix {
        Some(suffix) => append_entity_id_suffix(&document, suffix),
        None => document,
    })
}

pub struct HttpMetadataSource {
    client: Client,
}

impl HttpMetadataSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn fetch_text(&self, url: &str) -> Result<String, Error> {
        self.client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| Error::io(format!("fetching {url}"), e))?
            .text()
            .await
            .map_err(|e| Error::io(format!("reading body of {url}"), e))
    }
}
