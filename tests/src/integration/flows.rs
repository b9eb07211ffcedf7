//! # Portal Flows
//!
//! Drives the gateway over a real socket. The invoice authority and the
//! document storage authority are wiremock servers, so every assertion on
//! upstream traffic is checked by the mock expectations when the servers
//! drop.

#[cfg(test)]
mod tests {
    use invoice_portal_gateway::{GatewayConfig, GatewayService};
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;
    use uuid::Uuid;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "k3y_f0r-customer";
    const CACHED_KEY: &str = "invoices/2024/INV-2041.pdf";
    const FRESH_KEY: &str = "invoices/2024/INV-2041-r2.pdf";

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Upstreams {
        authority: MockServer,
        storage: MockServer,
    }

    impl Upstreams {
        async fn start() -> Self {
            Self {
                authority: MockServer::start().await,
                storage: MockServer::start().await,
            }
        }

        fn config(&self) -> GatewayConfig {
            let mut config = GatewayConfig::default();
            config.upstream.authority_url = format!("{}/api/public-invoices", self.authority.uri());
            config.upstream.storage_url = format!("{}/api/invoicefiles", self.storage.uri());
            config
        }

        async fn validate_responds(&self, body: Value) {
            Mock::given(method("GET"))
                .and(path("/api/public-invoices/validate"))
                .and(query_param("token", TOKEN))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&self.authority)
                .await;
        }

        /// Mutating and streaming endpoints that must never be reached.
        async fn forbid_beyond_validation(&self) {
            for (verb, route) in [
                ("GET", "/api/public-invoices/ensure-pdf"),
                ("POST", "/api/public-invoices/viewed"),
                ("POST", "/api/public-invoices/signature"),
            ] {
                Mock::given(method(verb))
                    .and(path(route))
                    .respond_with(ResponseTemplate::new(200))
                    .expect(0)
                    .mount(&self.authority)
                    .await;
            }
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&self.storage)
                .await;
        }
    }

    fn valid_record(invoice_id: Uuid) -> Value {
        json!({
            "is_valid": true,
            "invoice_id": invoice_id.to_string(),
            "pdf_storage_key": CACHED_KEY,
            "invoice_number": "INV-2041",
            "invoice_date": "2024-03-01T09:30:00",
            "invoice_due_date": "2024-03-31",
            "signature_path": null,
            "viewed": false
        })
    }

    fn pdf_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 241) as u8).collect()
    }

    struct RunningGateway {
        addr: SocketAddr,
        shutdown: Option<oneshot::Sender<()>>,
        handle: Option<JoinHandle<()>>,
        client: reqwest::Client,
    }

    impl RunningGateway {
        async fn start(config: GatewayConfig) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (tx, rx) = oneshot::channel::<()>();
            let service = GatewayService::new(config).unwrap();

            let handle = tokio::spawn(async move {
                service
                    .serve(listener, async {
                        let _ = rx.await;
                    })
                    .await
                    .unwrap();
            });

            Self {
                addr,
                shutdown: Some(tx),
                handle: Some(handle),
                client: reqwest::Client::new(),
            }
        }

        fn url(&self, invoice_id: Uuid, suffix: &str) -> String {
            format!(
                "http://{}/public/invoices/{}/{}{}",
                self.addr, invoice_id, TOKEN, suffix
            )
        }

        async fn stop(mut self) {
            if let Some(tx) = self.shutdown.take() {
                let _ = tx.send(());
            }
            if let Some(handle) = self.handle.take() {
                handle.await.unwrap();
            }
        }
    }

    // =============================================================================
    // METADATA
    // =============================================================================

    #[tokio::test]
    async fn test_metadata_flow() {
        let upstreams = Upstreams::start().await;
        let invoice_id = Uuid::new_v4();
        upstreams.validate_responds(valid_record(invoice_id)).await;
        upstreams.forbid_beyond_validation().await;

        let gateway = RunningGateway::start(upstreams.config()).await;
        let response = gateway
            .client
            .get(gateway.url(invoice_id, ""))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert!(response.headers().contains_key("x-request-id"));
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["invoice_number"], "INV-2041");
        assert_eq!(body["date"], "Friday, March 1, 2024");
        assert_eq!(body["due_date"], "Sunday, March 31, 2024");
        assert_eq!(body["signature_path"], "");
        assert_eq!(body["viewed"], false);

        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_correlation_id_round_trips() {
        let upstreams = Upstreams::start().await;
        let invoice_id = Uuid::new_v4();
        upstreams.validate_responds(valid_record(invoice_id)).await;

        let gateway = RunningGateway::start(upstreams.config()).await;
        let request_id = Uuid::new_v4().to_string();
        let response = gateway
            .client
            .get(gateway.url(invoice_id, ""))
            .header("x-request-id", &request_id)
            .send()
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], request_id.as_str());
        gateway.stop().await;
    }

    // =============================================================================
    // REJECTIONS
    // =============================================================================

    #[tokio::test]
    async fn test_invalid_token_never_reaches_mutating_endpoints() {
        let upstreams = Upstreams::start().await;
        upstreams
            .validate_responds(json!({ "is_valid": false, "error": "Link expired" }))
            .await;
        upstreams.forbid_beyond_validation().await;

        let gateway = RunningGateway::start(upstreams.config()).await;
        let invoice_id = Uuid::new_v4();
        let client = &gateway.client;

        let responses = vec![
            client.get(gateway.url(invoice_id, "")).send().await.unwrap(),
            client.get(gateway.url(invoice_id, "/file")).send().await.unwrap(),
            client.post(gateway.url(invoice_id, "/viewed")).send().await.unwrap(),
            client
                .post(gateway.url(invoice_id, "/signature"))
                .json(&json!({ "signature_path": "signatures/a.png" }))
                .send()
                .await
                .unwrap(),
        ];
        for response in responses {
            assert_eq!(response.status(), 401);
            let body: Value = response.json().await.unwrap();
            assert_eq!(body, json!({ "success": false, "error": "Link expired" }));
        }

        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_token_for_another_invoice_is_rejected() {
        let upstreams = Upstreams::start().await;
        upstreams.validate_responds(valid_record(Uuid::new_v4())).await;
        upstreams.forbid_beyond_validation().await;

        let gateway = RunningGateway::start(upstreams.config()).await;
        let response = gateway
            .client
            .post(gateway.url(Uuid::new_v4(), "/viewed"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_authority_outage_is_500() {
        let upstreams = Upstreams::start().await;
        Mock::given(method("GET"))
            .and(path("/api/public-invoices/validate"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&upstreams.authority)
            .await;
        upstreams.forbid_beyond_validation().await;

        let gateway = RunningGateway::start(upstreams.config()).await;
        let response = gateway
            .client
            .get(gateway.url(Uuid::new_v4(), ""))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        gateway.stop().await;
    }

    // =============================================================================
    // DOCUMENT
    // =============================================================================

    #[tokio::test]
    async fn test_file_streams_regenerated_artifact() {
        let upstreams = Upstreams::start().await;
        let invoice_id = Uuid::new_v4();
        upstreams.validate_responds(valid_record(invoice_id)).await;
        Mock::given(method("GET"))
            .and(path("/api/public-invoices/ensure-pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "storage_key": FRESH_KEY,
                "was_regenerated": true
            })))
            .expect(1)
            .mount(&upstreams.authority)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/invoicefiles/stream-pdf"))
            .and(query_param("storage-key", FRESH_KEY))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(pdf_bytes(4096)),
            )
            .expect(1)
            .mount(&upstreams.storage)
            .await;

        let gateway = RunningGateway::start(upstreams.config()).await;
        let response = gateway
            .client
            .get(gateway.url(invoice_id, "/file"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "application/pdf");
        assert_eq!(response.headers()["accept-ranges"], "bytes");
        assert_eq!(response.bytes().await.unwrap().to_vec(), pdf_bytes(4096));
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_file_falls_back_to_cached_artifact() {
        let upstreams = Upstreams::start().await;
        let invoice_id = Uuid::new_v4();
        upstreams.validate_responds(valid_record(invoice_id)).await;
        Mock::given(method("GET"))
            .and(path("/api/public-invoices/ensure-pdf"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&upstreams.authority)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/invoicefiles/stream-pdf"))
            .and(query_param("storage-key", CACHED_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf_bytes(512)))
            .expect(1)
            .mount(&upstreams.storage)
            .await;

        let gateway = RunningGateway::start(upstreams.config()).await;
        let response = gateway
            .client
            .get(gateway.url(invoice_id, "/file"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.bytes().await.unwrap().to_vec(), pdf_bytes(512));
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_file_range_is_forwarded() {
        let upstreams = Upstreams::start().await;
        let invoice_id = Uuid::new_v4();
        let document = pdf_bytes(4096);
        upstreams.validate_responds(valid_record(invoice_id)).await;
        Mock::given(method("GET"))
            .and(path("/api/public-invoices/ensure-pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "storage_key": CACHED_KEY,
                "was_regenerated": false
            })))
            .mount(&upstreams.authority)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/invoicefiles/stream-pdf"))
            .and(header("range", "bytes=0-99"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("content-range", "bytes 0-99/4096")
                    .set_body_bytes(document[..100].to_vec()),
            )
            .expect(1)
            .mount(&upstreams.storage)
            .await;

        let gateway = RunningGateway::start(upstreams.config()).await;
        let response = gateway
            .client
            .get(gateway.url(invoice_id, "/file"))
            .header("range", "bytes=0-99")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 206);
        assert_eq!(response.headers()["content-range"], "bytes 0-99/4096");
        let bytes = response.bytes().await.unwrap();
        assert_eq!(bytes.len(), 100);
        assert_eq!(bytes.to_vec(), document[..100].to_vec());
        gateway.stop().await;
    }

    // =============================================================================
    // ACTIONS
    // =============================================================================

    #[tokio::test]
    async fn test_mark_viewed_flow() {
        let upstreams = Upstreams::start().await;
        let invoice_id = Uuid::new_v4();
        upstreams.validate_responds(valid_record(invoice_id)).await;
        Mock::given(method("POST"))
            .and(path("/api/public-invoices/viewed"))
            .and(query_param("token", TOKEN))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&upstreams.authority)
            .await;

        let gateway = RunningGateway::start(upstreams.config()).await;
        let response = gateway
            .client
            .post(gateway.url(invoice_id, "/viewed"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body,
            json!({ "success": true, "message": "Invoice marked as viewed" })
        );
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_signature_limits() {
        let upstreams = Upstreams::start().await;
        let invoice_id = Uuid::new_v4();
        upstreams.validate_responds(valid_record(invoice_id)).await;
        Mock::given(method("POST"))
            .and(path("/api/public-invoices/signature"))
            .and(body_json(json!({ "signature_path": "s" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&upstreams.authority)
            .await;

        let gateway = RunningGateway::start(upstreams.config()).await;

        let oversized = gateway
            .client
            .post(gateway.url(invoice_id, "/signature"))
            .json(&json!({ "signature_path": "s".repeat(6000) }))
            .send()
            .await
            .unwrap();
        assert_eq!(oversized.status(), 400);

        let minimal = gateway
            .client
            .post(gateway.url(invoice_id, "/signature"))
            .json(&json!({ "signature_path": "s" }))
            .send()
            .await
            .unwrap();
        assert_eq!(minimal.status(), 200);
        let body: Value = minimal.json().await.unwrap();
        assert_eq!(body["message"], "Signature submitted successfully");

        gateway.stop().await;
    }
}
