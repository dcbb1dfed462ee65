use async_trait::async_trait;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::Client;
use aws_types::SdkConfig;
use custom_resource::Error;

use crate::sync::ProviderRegistry;

pub struct IamRegistry {
    client: Client,
}

impl IamRegistry {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn sdk_error(context: String, e: impl std::error::Error) -> Error {
    Error::io(context, DisplayErrorContext(e).to_string())
}

#[async_trait]
impl ProviderRegistry for IamRegistry {
    async fn provider_arns(&self) -> Result<Vec<String>, Error> {
        let resp = self
            .client
            .list_saml_providers()
            .send()
            .await
            .map_err(|e| sdk_error("listing SAML providers".into(), e))?;

        Ok(resp
            .saml_provider_list()
            .iter()
            .filter_map(|provider| provider.arn().map(str::to_owned))
            .collect())
    }

    async fn metadata_document(&self, arn: &str) -> Result<String, Error> {
        let resp = self
            .client
            .get_saml_provider()
            .saml_provider_arn(arn)
            .send()
            .await
            .map_err(|e| sdk_error(format!("reading SAML provider {arn}"), e))?;

        resp.saml_metadata_document()
            .map(str::to_owned)
            .ok_or_else(|| Error::io(format!("reading SAML provider {arn}"), "no metadata document"))
    }

    async fn create_provider(&self, name: &str, document: &str) -> Result<(), Error> {
        self.client
            .create_saml_provider()
            .name(name)
            .saml_metadata_document(document)
            .send()
            .await
            .map_err(|e| sdk_error(format!("creating SAML provider {name}"), e))?;

        Ok(())
    }

    async fn update_provider(&self, arn: &str, document: &str) -> Result<(), Error> {
        self.client
            .update_saml_provider()
            .saml_provider_arn(arn)
            .saml_metadata_document(document)
            .send()
            .await
            .map_err(|e| sdk_error(format!("updating SAML provider {arn}"), e))?;

        Ok(())
    }
}
