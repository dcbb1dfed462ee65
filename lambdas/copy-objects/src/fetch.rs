use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use custom_resource::Error;
use reqwest::{Body, Client};

use crate::copier::{SourceFetcher, SourceObject};

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<SourceObject, Error> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| Error::io(format!("fetching {url}"), e))?;

        Ok(SourceObject {
            content_length: resp.content_length(),
            body: ByteStream::from_body_1_x(Body::from(resp)),
        })
    }
}
