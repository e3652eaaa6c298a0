use super::parse::{
    created_object, list_items, parse_container, parse_document, parse_listing,
    parse_metadata_field,
};
use super::traits::{
    KnowledgeStore, Listing, MetadataField, MetadataValue, NewDocument, RemoteContainer,
    RemoteDocument,
};
use crate::config::StoreConfig;
use crate::http::{build_http_client, read_json};
use crate::resilience::RemoteError;
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::{json, Value};
use std::time::Duration;

/// [`KnowledgeStore`] over a dataset/document REST API with bearer auth
///
/// Routes (relative to `base-url`):
/// - `GET|POST /datasets`
/// - `GET /datasets/{id}/documents`, `POST /datasets/{id}/document/create-by-text`
/// - `DELETE /datasets/{id}/documents/{doc}`
/// - `GET|POST /datasets/{id}/metadata`, `POST /datasets/{id}/documents/metadata`
pub struct HttpKnowledgeStore {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpKnowledgeStore {
    pub fn new(config: &StoreConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client: build_http_client(Duration::from_secs(config.timeout_secs))?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, RemoteError> {
        let response = request.bearer_auth(&self.api_key).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl KnowledgeStore for HttpKnowledgeStore {
    async fn list_containers(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<Listing<RemoteContainer>, RemoteError> {
        let body = self
            .send(
                self.client
                    .get(self.url("/datasets"))
                    .query(&[("page", page), ("limit", limit)]),
            )
            .await?;
        parse_listing(&body, parse_container)
    }

    async fn create_container(&self, name: &str) -> Result<RemoteContainer, RemoteError> {
        let body = self
            .send(
                self.client
                    .post(self.url("/datasets"))
                    .json(&json!({ "name": name, "indexing_technique": "high_quality" })),
            )
            .await?;
        let created = created_object(&body, "dataset");
        parse_container(created).or_else(|_| {
            // some deployments echo only the id
            parse_document(created, Some(name)).map(|d| RemoteContainer {
                id: d.id,
                name: d.name,
            })
        })
    }

    async fn list_documents(
        &self,
        container_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Listing<RemoteDocument>, RemoteError> {
        let body = self
            .send(
                self.client
                    .get(self.url(&format!("/datasets/{}/documents", container_id)))
                    .query(&[("page", page), ("limit", limit)]),
            )
            .await?;
        parse_listing(&body, |v| parse_document(v, None))
    }

    async fn create_document(
        &self,
        container_id: &str,
        document: &NewDocument,
    ) -> Result<RemoteDocument, RemoteError> {
        let payload = json!({
            "name": document.name,
            "text": document.text,
            "indexing_technique": "high_quality",
            "doc_form": "hierarchical_model",
            "process_rule": document.process_rule,
        });
        let body = self
            .send(
                self.client
                    .post(self.url(&format!(
                        "/datasets/{}/document/create-by-text",
                        container_id
                    )))
                    .json(&payload),
            )
            .await?;
        parse_document(created_object(&body, "document"), Some(&document.name))
    }

    async fn delete_document(&self, container_id: &str, document_id: &str) -> Result<(), RemoteError> {
        self.send(self.client.delete(self.url(&format!(
            "/datasets/{}/documents/{}",
            container_id, document_id
        ))))
        .await?;
        Ok(())
    }

    async fn list_metadata_fields(&self, container_id: &str) -> Result<Vec<MetadataField>, RemoteError> {
        let body = self
            .send(
                self.client
                    .get(self.url(&format!("/datasets/{}/metadata", container_id))),
            )
            .await?;
        list_items(&body)?.iter().map(parse_metadata_field).collect()
    }

    async fn create_metadata_field(
        &self,
        container_id: &str,
        name: &str,
    ) -> Result<MetadataField, RemoteError> {
        let body = self
            .send(
                self.client
                    .post(self.url(&format!("/datasets/{}/metadata", container_id)))
                    .json(&json!({ "type": "string", "name": name })),
            )
            .await?;
        parse_metadata_field(created_object(&body, "field"))
    }

    async fn assign_metadata(
        &self,
        container_id: &str,
        document_id: &str,
        values: &[MetadataValue],
    ) -> Result<(), RemoteError> {
        let metadata_list: Vec<Value> = values
            .iter()
            .map(|v| json!({ "id": v.field_id, "name": v.name, "value": v.value }))
            .collect();
        self.send(
            self.client
                .post(self.url(&format!("/datasets/{}/documents/metadata", container_id)))
                .json(&json!({
                    "operation_data": [{
                        "document_id": document_id,
                        "metadata_list": metadata_list,
                    }]
                })),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_store(server: &MockServer) -> HttpKnowledgeStore {
        HttpKnowledgeStore::new(&StoreConfig {
            base_url: format!("{}/v1/", server.uri()),
            api_key: "kb-key".to_string(),
            page_size: 20,
            preload_cache: false,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_containers_with_auth_and_paging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/datasets"))
            .and(query_param("page", "2"))
            .and(query_param("limit", "20"))
            .and(header("authorization", "Bearer kb-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "c1", "name": "eos"}, {"dataset_id": "c2", "title": "react"}],
                "has_more": true
            })))
            .mount(&server)
            .await;

        let listing = create_test_store(&server).list_containers(2, 20).await.unwrap();
        assert!(listing.has_more);
        assert_eq!(listing.items[1].id, "c2");
        assert_eq!(listing.items[1].name, "react");
    }

    #[tokio::test]
    async fn test_create_document_shapes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/datasets/c1/document/create-by-text"))
            .and(body_partial_json(json!({"name": "x.com/a", "text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "document": {"id": "d1", "name": "x.com/a"}, "batch": "b1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/datasets/c2/document/create-by-text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"document_id": "d2"})))
            .mount(&server)
            .await;

        let store = create_test_store(&server);
        let doc = NewDocument {
            name: "x.com/a".to_string(),
            text: "hello".to_string(),
            process_rule: json!({"mode": "automatic"}),
        };

        let created = store.create_document("c1", &doc).await.unwrap();
        assert_eq!(created.id, "d1");

        let created = store.create_document("c2", &doc).await.unwrap();
        assert_eq!(created.id, "d2");
        assert_eq!(created.name, "x.com/a");
    }

    #[tokio::test]
    async fn test_unparsable_and_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/datasets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/datasets/c1/documents"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let store = create_test_store(&server);
        assert!(matches!(
            store.create_container("eos").await,
            Err(RemoteError::Unparsable(_))
        ));

        let err = store.list_documents("c1", 1, 20).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_metadata_routes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/datasets/c1/metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "doc_metadata": [{"id": "f1", "name": "source_url", "type": "string"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/datasets/c1/metadata"))
            .and(body_partial_json(json!({"name": "domain"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "f2", "name": "domain"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/datasets/c1/documents/metadata"))
            .and(body_partial_json(json!({"operation_data": [{"document_id": "d1"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = create_test_store(&server);
        let fields = store.list_metadata_fields("c1").await.unwrap();
        assert_eq!(fields[0].name, "source_url");

        let created = store.create_metadata_field("c1", "domain").await.unwrap();
        assert_eq!(created.id, "f2");

        store
            .assign_metadata(
                "c1",
                "d1",
                &[MetadataValue {
                    field_id: "f1".into(),
                    name: "source_url".into(),
                    value: "https://x.com/a".into(),
                }],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_document() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/datasets/c1/documents/d1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        create_test_store(&server)
            .delete_document("c1", "d1")
            .await
            .unwrap();
    }
}
