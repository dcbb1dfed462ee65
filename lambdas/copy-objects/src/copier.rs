use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use custom_resource::{CustomResourceEvent, Error, RequestType};
use lambda_runtime::tracing;
use serde::Deserialize;
use serde_json::Value;

/// A source object on its way to the bucket. The body is streamed, never
/// held whole.
pub struct SourceObject {
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<SourceObject, Error>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, bucket: &str, key: &str, object: SourceObject) -> Result<(), Error>;
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), Error>;
}

/// Resource properties of the copy custom resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CopyRequest {
    #[serde(rename = "SourceURLs")]
    pub source_urls: Vec<String>,
    pub dest_bucket: String,
    pub prefix: String,
    pub dest_objects: Vec<String>,
}

impl CopyRequest {
    pub fn from_properties(properties: Value) -> Result<Self, Error> {
        let request: Self = serde_json::from_value(properties)
            .map_err(|e| Error::InvalidInput(format!("resource properties: {e}")))?;

        if request.source_urls.len() != request.dest_objects.len() {
            return Err(Error::InvalidInput(format!(
                "{} source URLs but {} destination objects",
                request.source_urls.len(),
                request.dest_objects.len()
            )));
        }

        Ok(request)
    }

    fn keys(&self) -> Vec<String> {
        self.dest_objects
            .iter()
            .map(|object| format!("{}{object}", self.prefix))
            .collect()
    }
}

pub async fn handle_event(
    payload: Value,
    fetcher: &dyn SourceFetcher,
    store: &dyn ObjectStore,
) -> anyhow::Result<()> {
    let event: CustomResourceEvent<Value> = serde_json::from_value(payload)
        .map_err(|e| Error::InvalidInput(format!("custom resource event: {e}")))?;

    dispatch(event.request_type, event.resource_properties, fetcher, store).await
}

pub async fn dispatch(
    request_type: RequestType,
    properties: Value,
    fetcher: &dyn SourceFetcher,
    store: &dyn ObjectStore,
) -> anyhow::Result<()> {
    let request = CopyRequest::from_properties(properties)?;
    tracing::info!(
        "source_urls: {}, objects: {}",
        request.source_urls.len(),
        request.dest_objects.len()
    );

    match request_type {
        RequestType::Delete => delete_objects(&request, store).await?,
        RequestType::Create | RequestType::Update => copy_objects(&request, fetcher, store).await?,
    }

    Ok(())
}

async fn copy_objects(
    request: &CopyRequest,
    fetcher: &dyn SourceFetcher,
    store: &dyn ObjectStore,
) -> Result<(), Error> {
    for (url, key) in request.source_urls.iter().zip(request.keys()) {
        tracing::info!("copying {url} to s3://{}/{key}", request.dest_bucket);
        let object = fetcher.fetch(url).await?;
        store.put_object(&request.dest_bucket, &key, object).await?;
    }

    Ok(())
}

async fn delete_objects(request: &CopyRequest, store: &dyn ObjectStore) -> Result<(), Error> {
    let keys = request.keys();
    if keys.is_empty() {
        return Ok(());
    }

    tracing::info!("deleting {} objects from s3://{}", keys.len(), request.dest_bucket);
    store.delete_objects(&request.dest_bucket, &keys).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct FakeFetcher {
        failing_url: Option<&'static str>,
        fetched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SourceFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<SourceObject, Error> {
            self.fetched.lock().expect("poisoned mutex").push(url.to_owned());
            if self.failing_url == Some(url) {
                return Err(Error::io(format!("fetching {url}"), "404 Not Found"));
            }
            let body = format!("body of {url}").into_bytes();
            Ok(SourceObject {
                content_length: Some(body.len() as u64),
                body: ByteStream::from(body),
            })
        }
    }

    #[derive(Default)]
    struct CapturingStore {
        puts: Mutex<Vec<(String, String, Vec<u8>)>>,
        deletes: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl CapturingStore {
        fn puts(&self) -> Vec<(String, String, Vec<u8>)> {
            self.puts.lock().expect("poisoned mutex").clone()
        }

        fn deletes(&self) -> Vec<(String, Vec<String>)> {
            self.deletes.lock().expect("poisoned mutex").clone()
        }
    }

    #[async_trait]
    impl ObjectStore for CapturingStore {
        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            object: SourceObject,
        ) -> Result<(), Error> {
            let body = object
                .body
                .collect()
                .await
                .map_err(|e| Error::io("reading source body", e))?
                .into_bytes()
                .to_vec();
            self.puts
                .lock()
                .expect("poisoned mutex")
                .push((bucket.to_owned(), key.to_owned(), body));
            Ok(())
        }

        async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), Error> {
            self.deletes
                .lock()
                .expect("poisoned mutex")
                .push((bucket.to_owned(), keys.to_vec()));
            Ok(())
        }
    }

    fn properties(urls: &[&str], objects: &[&str]) -> Value {
        json!({
            "ServiceToken": "arn:aws:lambda:us-east-1:123456789012:function:copy",
            "SourceURLs": urls,
            "DestBucket": "artifacts",
            "Prefix": "lambda/",
            "DestObjects": objects,
        })
    }

    #[tokio::test]
    async fn copies_each_pair_under_prefix() {
        let fetcher = FakeFetcher::default();
        let store = CapturingStore::default();

        dispatch(
            RequestType::Create,
            properties(
                &["https://src.example/a.zip", "https://src.example/b.zip"],
                &["a.zip", "nested/b.zip"],
            ),
            &fetcher,
            &store,
        )
        .await
        .unwrap();

        assert_eq!(
            store.puts(),
            vec![
                (
                    "artifacts".to_owned(),
                    "lambda/a.zip".to_owned(),
                    b"body of https://src.example/a.zip".to_vec()
                ),
                (
                    "artifacts".to_owned(),
                    "lambda/nested/b.zip".to_owned(),
                    b"body of https://src.example/b.zip".to_vec()
                ),
            ]
        );
        assert!(store.deletes().is_empty());
    }

    #[tokio::test]
    async fn update_copies_like_create() {
        let fetcher = FakeFetcher::default();
        let store = CapturingStore::default();

        dispatch(
            RequestType::Update,
            properties(&["https://src.example/a.zip"], &["a.zip"]),
            &fetcher,
            &store,
        )
        .await
        .unwrap();

        assert_eq!(store.puts().len(), 1);
    }

    #[tokio::test]
    async fn delete_issues_one_batch() {
        let fetcher = FakeFetcher::default();
        let store = CapturingStore::default();

        dispatch(
            RequestType::Delete,
            properties(
                &["https://src.example/a.zip", "https://src.example/b.zip"],
                &["a.zip", "b.zip"],
            ),
            &fetcher,
            &store,
        )
        .await
        .unwrap();

        assert_eq!(
            store.deletes(),
            vec![(
                "artifacts".to_owned(),
                vec!["lambda/a.zip".to_owned(), "lambda/b.zip".to_owned()]
            )]
        );
        assert!(store.puts().is_empty());
        assert!(fetcher.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_delete_makes_no_call() {
        let fetcher = FakeFetcher::default();
        let store = CapturingStore::default();

        dispatch(RequestType::Delete, properties(&[], &[]), &fetcher, &store)
            .await
            .unwrap();

        assert!(store.deletes().is_empty());
    }

    #[tokio::test]
    async fn mismatched_lengths_fail_before_any_io() {
        for request_type in [RequestType::Create, RequestType::Delete] {
            let fetcher = FakeFetcher::default();
            let store = CapturingStore::default();

            let err = dispatch(
                request_type,
                properties(&["https://src.example/a.zip"], &["a.zip", "b.zip"]),
                &fetcher,
                &store,
            )
            .await
            .unwrap_err();

            assert!(matches!(
                err.downcast_ref::<Error>(),
                Some(Error::InvalidInput(_))
            ));
            assert!(fetcher.fetched.lock().unwrap().is_empty());
            assert!(store.puts().is_empty());
            assert!(store.deletes().is_empty());
        }
    }

    #[tokio::test]
    async fn unparsable_event_is_invalid_input() {
        let fetcher = FakeFetcher::default();
        let store = CapturingStore::default();

        let err = handle_event(
            json!({
                "RequestType": "Rollback",
                "ResponseURL": "https://response.example/put",
                "ResourceProperties": properties(&["https://src.example/a.zip"], &["a.zip"]),
            }),
            &fetcher,
            &store,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidInput(_))
        ));
        assert!(fetcher.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn event_is_dispatched_by_request_type() {
        let fetcher = FakeFetcher::default();
        let store = CapturingStore::default();

        handle_event(
            json!({
                "RequestType": "Delete",
                "ResponseURL": "https://response.example/put",
                "StackId": "stack",
                "RequestId": "req",
                "LogicalResourceId": "CopyZips",
                "ResourceProperties": properties(&["https://src.example/a.zip"], &["a.zip"]),
            }),
            &fetcher,
            &store,
        )
        .await
        .unwrap();

        assert_eq!(
            store.deletes(),
            vec![("artifacts".to_owned(), vec!["lambda/a.zip".to_owned()])]
        );
    }

    #[test]
    fn missing_property_is_invalid_input() {
        let err = CopyRequest::from_properties(json!({ "DestBucket": "artifacts" })).unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn first_fetch_failure_aborts_remaining_copies() {
        let fetcher = FakeFetcher {
            failing_url: Some("https://src.example/b.zip"),
            ..Default::default()
        };
        let store = CapturingStore::default();

        let err = dispatch(
            RequestType::Create,
            properties(
                &[
                    "https://src.example/a.zip",
                    "https://src.example/b.zip",
                    "https://src.example/c.zip",
                ],
                &["a.zip", "b.zip", "c.zip"],
            ),
            &fetcher,
            &store,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::TransientIo { .. })
        ));
        assert_eq!(
            *fetcher.fetched.lock().unwrap(),
            vec!["https://src.example/a.zip", "https://src.example/b.zip"]
        );
        let keys: Vec<_> = store.puts().into_iter().map(|(_, key, _)| key).collect();
        assert_eq!(keys, vec!["lambda/a.zip"]);
    }
}
