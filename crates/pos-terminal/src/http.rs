//! # HTTP Transaction Service
//!
//! [`TransactionService`] over the backend's JSON API.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Backend Endpoints                               │
//! │                                                                         │
//! │  POST /api/transactions                 NewTransactionDto ─► TRD_ID    │
//! │  GET  /api/products-by-code/{code}      ─► ProductDto | 404            │
//! │  POST /api/transactions/{id}/details    DetailDto ─► 2xx               │
//! │  GET  /api/transactions/{id}            ─► TransactionDto              │
//! │                                                                         │
//! │  Every call is bounded by `request_timeout`; expiry is Timeout.        │
//! │  Any non-2xx other than a product 404 is UnexpectedStatus.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use pos_core::{DetailRecord, NewTransaction, Product, TransactionId, TransactionRecord};

use crate::config::TerminalConfig;
use crate::error::{TerminalError, TerminalResult};
use crate::service::TransactionService;
use crate::wire::{DetailDto, NewTransactionDto, ProductDto, TransactionDto};

/// HTTP client for the transaction service.
#[derive(Debug, Clone)]
pub struct HttpTransactionService {
    http: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl HttpTransactionService {
    /// Creates a client for the service at `base_url`.
    pub fn new(base_url: &str, request_timeout: Duration) -> TerminalResult<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(TerminalError::InvalidUrl(base_url.to_string()));
        }

        Ok(HttpTransactionService {
            http: Client::builder().connect_timeout(request_timeout).build()?,
            base_url,
            request_timeout,
        })
    }

    pub fn from_config(config: &TerminalConfig) -> TerminalResult<Self> {
        Self::new(&config.backend.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `{base}/api/{segments...}`, encoding each segment on its own so
    /// a code containing `/` or `?` stays a single path segment.
    fn endpoint(&self, segments: &[&str]) -> TerminalResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TerminalError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    /// Runs `fut` under the request timeout.
    async fn bounded<T, F>(&self, fut: F) -> TerminalResult<T>
    where
        F: Future<Output = TerminalResult<T>>,
    {
        match timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(TerminalError::Timeout(self.request_timeout.as_secs())),
        }
    }

    fn request_error(&self, err: reqwest::Error) -> TerminalError {
        if err.is_timeout() {
            TerminalError::Timeout(self.request_timeout.as_secs())
        } else {
            err.into()
        }
    }
}

fn unexpected(status: StatusCode, context: &str) -> TerminalError {
    warn!(status = status.as_u16(), context, "Transaction service returned an error status");
    TerminalError::UnexpectedStatus {
        status: status.as_u16(),
        context: context.to_string(),
    }
}

#[async_trait]
impl TransactionService for HttpTransactionService {
    async fn create_transaction(&self, tx: &NewTransaction) -> TerminalResult<TransactionId> {
        let url = self.endpoint(&["transactions"])?;
        let body = NewTransactionDto::from(tx);
        debug!(%url, "Creating transaction");

        self.bounded(async {
            let response = self
                .http
                .post(url)
                .json(&body)
                .send()
                .await
                .map_err(|e| self.request_error(e))?;
            if !response.status().is_success() {
                return Err(unexpected(response.status(), "create transaction"));
            }

            let created: TransactionDto = response.json().await?;
            Ok(TransactionId(created.id))
        })
        .await
    }

    async fn lookup_product(&self, code: &str) -> TerminalResult<Option<Product>> {
        let url = self.endpoint(&["products-by-code", code])?;
        debug!(%url, "Looking up product");

        self.bounded(async {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| self.request_error(e))?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !response.status().is_success() {
                return Err(unexpected(response.status(), "product lookup"));
            }

            let product: ProductDto = response.json().await?;
            Product::try_from(product).map(Some)
        })
        .await
    }

    async fn add_detail(&self, detail: &DetailRecord) -> TerminalResult<()> {
        let tx_id = detail.transaction_id.to_string();
        let url = self.endpoint(&["transactions", &tx_id, "details"])?;
        let body = DetailDto::from(detail);
        debug!(%url, detail_id = %detail.detail_id, "Writing transaction detail");

        self.bounded(async {
            let response = self
                .http
                .post(url)
                .json(&body)
                .send()
                .await
                .map_err(|e| self.request_error(e))?;
            if !response.status().is_success() {
                return Err(unexpected(response.status(), "add detail"));
            }
            Ok(())
        })
        .await
    }

    async fn get_transaction(&self, id: TransactionId) -> TerminalResult<TransactionRecord> {
        let tx_id = id.to_string();
        let url = self.endpoint(&["transactions", &tx_id])?;
        debug!(%url, "Fetching transaction");

        self.bounded(async {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| self.request_error(e))?;
            if !response.status().is_success() {
                return Err(unexpected(response.status(), "get transaction"));
            }

            let record: TransactionDto = response.json().await?;
            Ok(record.into())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::Utc;
    use pos_core::{DetailId, Money, TerminalIdentity};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Backend {
        transactions: Arc<Mutex<Vec<NewTransactionDto>>>,
        details: Arc<Mutex<Vec<(i64, DetailDto)>>>,
    }

    async fn create(State(backend): State<Backend>, Json(body): Json<NewTransactionDto>) -> impl IntoResponse {
        let echo = TransactionDto {
            id: 7,
            datetime: Some(body.datetime.to_rfc3339()),
            operator_code: body.operator_code.clone(),
            store_code: body.store_code.clone(),
            terminal_no: body.terminal_no.clone(),
            total: body.total,
        };
        backend.transactions.lock().unwrap().push(body);
        Json(echo)
    }

    async fn product(Path(code): Path<String>) -> axum::response::Response {
        match code.as_str() {
            "A1" | "A/1" => Json(ProductDto {
                id: 1,
                code: code.clone(),
                name: "Tea".into(),
                price: 150,
            })
            .into_response(),
            "NEG" => Json(ProductDto {
                id: 9,
                code: code.clone(),
                name: "Refund".into(),
                price: -500,
            })
            .into_response(),
            "boom" => AxumStatus::INTERNAL_SERVER_ERROR.into_response(),
            "garbled" => "not json".into_response(),
            _ => AxumStatus::NOT_FOUND.into_response(),
        }
    }

    async fn add_detail(
        State(backend): State<Backend>,
        Path(id): Path<i64>,
        Json(body): Json<DetailDto>,
    ) -> AxumStatus {
        if body.code == "reject" {
            return AxumStatus::UNPROCESSABLE_ENTITY;
        }
        backend.details.lock().unwrap().push((id, body));
        AxumStatus::CREATED
    }

    async fn transaction(State(backend): State<Backend>, Path(id): Path<i64>) -> axum::response::Response {
        if id != 7 {
            return AxumStatus::NOT_FOUND.into_response();
        }
        let total = backend
            .details
            .lock()
            .unwrap()
            .iter()
            .map(|(_, d)| d.price)
            .sum::<i64>();
        Json(TransactionDto {
            id,
            datetime: Some("2025-04-01 09:30:00".into()),
            operator_code: "EMP01".into(),
            store_code: "30".into(),
            terminal_no: "90".into(),
            total,
        })
        .into_response()
    }

    async fn spawn_backend() -> (String, Backend) {
        let backend = Backend::default();
        let app = Router::new()
            .route("/api/transactions", post(create))
            .route("/api/products-by-code/{code}", get(product))
            .route("/api/transactions/{id}/details", post(add_detail))
            .route("/api/transactions/{id}", get(transaction))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), backend)
    }

    fn identity() -> TerminalIdentity {
        TerminalIdentity {
            operator_code: "EMP01".into(),
            store_code: "30".into(),
            terminal_no: "90".into(),
        }
    }

    fn unit(tx: TransactionId, n: u64, code: &str) -> DetailRecord {
        DetailRecord {
            detail_id: DetailId(n),
            transaction_id: tx,
            product_id: 1,
            code: code.into(),
            name: "Tea".into(),
            price: Money::from_yen(150),
        }
    }

    #[test]
    fn test_endpoint_encodes_code_as_one_segment() {
        let service =
            HttpTransactionService::new("https://pos.example.com/", Duration::from_secs(1)).unwrap();

        let url = service.endpoint(&["products-by-code", "A/1 ?"]).unwrap();
        assert_eq!(url.as_str(), "https://pos.example.com/api/products-by-code/A%2F1%20%3F");

        let nested =
            HttpTransactionService::new("https://pos.example.com/store", Duration::from_secs(1)).unwrap();
        let url = nested.endpoint(&["transactions", "7"]).unwrap();
        assert_eq!(url.as_str(), "https://pos.example.com/store/api/transactions/7");
    }

    #[test]
    fn test_rejects_non_base_url() {
        assert!(HttpTransactionService::new("mailto:pos@example.com", Duration::from_secs(1)).is_err());
        assert!(HttpTransactionService::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_full_purchase_round_trip() {
        let (base, backend) = spawn_backend().await;
        let service = HttpTransactionService::new(&base, Duration::from_secs(5)).unwrap();

        let id = service
            .create_transaction(&NewTransaction::opened_at(identity(), Utc::now()))
            .await
            .unwrap();
        assert_eq!(id, TransactionId(7));

        let sent = backend.transactions.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].operator_code, "EMP01");
        assert_eq!(sent[0].total, 0);

        service.add_detail(&unit(id, 1, "A1")).await.unwrap();
        service.add_detail(&unit(id, 2, "A1")).await.unwrap();

        let details = backend.details.lock().unwrap().clone();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].0, 7);
        assert_eq!(details[1].1.detail_id, 2);

        let record = service.get_transaction(id).await.unwrap();
        assert_eq!(record.total, Money::from_yen(300));
        assert!(record.created_at.is_some());
    }

    #[tokio::test]
    async fn test_lookup_classification() {
        let (base, _backend) = spawn_backend().await;
        let service = HttpTransactionService::new(&base, Duration::from_secs(5)).unwrap();

        let tea = service.lookup_product("A1").await.unwrap().unwrap();
        assert_eq!(tea.name, "Tea");
        assert_eq!(tea.price, Money::from_yen(150));

        let slashed = service.lookup_product("A/1").await.unwrap().unwrap();
        assert_eq!(slashed.code, "A/1");

        assert!(service.lookup_product("ZZZ").await.unwrap().is_none());

        let err = service.lookup_product("boom").await.unwrap_err();
        assert!(matches!(err, TerminalError::UnexpectedStatus { status: 500, .. }));

        let err = service.lookup_product("garbled").await.unwrap_err();
        assert!(matches!(err, TerminalError::MalformedResponse(_)));

        let err = service.lookup_product("NEG").await.unwrap_err();
        assert!(matches!(err, TerminalError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_detail_and_transaction_errors() {
        let (base, _backend) = spawn_backend().await;
        let service = HttpTransactionService::new(&base, Duration::from_secs(5)).unwrap();

        let err = service.add_detail(&unit(TransactionId(7), 1, "reject")).await.unwrap_err();
        assert!(matches!(err, TerminalError::UnexpectedStatus { status: 422, .. }));

        let err = service.get_transaction(TransactionId(99)).await.unwrap_err();
        assert!(matches!(err, TerminalError::UnexpectedStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let service =
            HttpTransactionService::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        let err = service.lookup_product("A1").await.unwrap_err();

        assert!(err.is_transport());
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let service =
            HttpTransactionService::new("http://127.0.0.1:9", Duration::from_secs(10)).unwrap();

        let result: TerminalResult<()> = service.bounded(std::future::pending()).await;

        assert!(matches!(result, Err(TerminalError::Timeout(10))));
    }
}
