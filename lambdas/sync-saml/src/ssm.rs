use async_trait::async_trait;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::types::ParameterStringFilter;
use aws_sdk_ssm::Client;
use aws_types::SdkConfig;
use custom_resource::Error;

use crate::config::Parameter;
use crate::sync::ConfigStore;

/// One `GetParametersByPath` call: a page of parameters and the token for
/// the next one.
#[async_trait]
pub trait ParameterPages: Send + Sync {
    async fn page(
        &self,
        path: &str,
        next_token: Option<String>,
    ) -> Result<(Vec<Parameter>, Option<String>), Error>;
}

pub async fn collect_parameters(
    pages: &dyn ParameterPages,
    path: &str,
) -> Result<Vec<Parameter>, Error> {
    let mut parameters = Vec::new();
    let mut next_token = None;
    loop {
        let (page, token) = pages.page(path, next_token).await?;
        parameters.extend(page);

        next_token = token;
        if next_token.is_none() {
            break;
        }
    }

    Ok(parameters)
}

pub struct SsmConfigStore {
    client: Client,
}

impl SsmConfigStore {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl ParameterPages for SsmConfigStore {
    async fn page(
        &self,
        path: &str,
        next_token: Option<String>,
    ) -> Result<(Vec<Parameter>, Option<String>), Error> {
        let string_only = ParameterStringFilter::builder()
            .key("Type")
            .option("Equals")
            .values("String")
            .build()
            .map_err(|e| Error::io("building parameter filter", e))?;

        let resp = self
            .client
            .get_parameters_by_path()
            .path(path)
            .recursive(true)
            .parameter_filters(string_only)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| {
                Error::io(
                    format!("listing parameters under {path}"),
                    DisplayErrorContext(e).to_string(),
                )
            })?;

        let parameters = resp
            .parameters()
            .iter()
            .filter_map(|p| {
                Some(Parameter {
                    name: p.name()?.to_owned(),
                    value: p.value()?.to_owned(),
                })
            })
            .collect();

        Ok((parameters, resp.next_token().map(str::to_owned)))
    }
}

#[async_trait]
impl ConfigStore for SsmConfigStore {
    async fn parameters_by_path(&self, path: &str) -> Result<Vec<Parameter>, Error> {
        collect_parameters(self, path).await
    }
}
