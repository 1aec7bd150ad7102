//! HTTP implementations of the downstream services.

use crate::error::{MuseumError, ServiceError, ServiceResult};
use crate::models::{EmailSend, IndexEntityType, NotificationCreate, OrderCreate};
use crate::services::{
    Collaborators, MailService, NotificationService, OrderService, SearchIndexService,
};
use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_parse, env_required};
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Base URLs of the downstream services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownstreamConfig {
    pub mail_url: String,
    pub notification_url: String,
    pub order_url: String,
    pub search_url: String,
    pub timeout: Duration,
}

impl FromEnv for DownstreamConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            mail_url: env_required("MAIL_SERVICE_URL")?,
            notification_url: env_required("NOTIFICATION_SERVICE_URL")?,
            order_url: env_required("ORDER_SERVICE_URL")?,
            search_url: env_required("SEARCH_SERVICE_URL")?,
            timeout: Duration::from_secs(env_parse("DOWNSTREAM_TIMEOUT_SECS", 10)?),
        })
    }
}

impl DownstreamConfig {
    /// Build one shared HTTP client and a service client per base URL.
    pub fn collaborators(&self) -> Result<Collaborators, MuseumError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| MuseumError::HttpClient(e.to_string()))?;

        Ok(Collaborators {
            mail: Arc::new(HttpMailService::new(client.clone(), &self.mail_url)),
            notifications: Arc::new(HttpNotificationService::new(
                client.clone(),
                &self.notification_url,
            )),
            orders: Arc::new(HttpOrderService::new(client.clone(), &self.order_url)),
            search: Arc::new(HttpSearchIndexService::new(client, &self.search_url)),
        })
    }
}

fn base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Send the request and map any non-2xx answer to a [`ServiceError`].
async fn execute(request: RequestBuilder) -> ServiceResult<()> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::from_status(status.as_u16(), body))
}

pub struct HttpMailService {
    client: Client,
    base_url: String,
}

impl HttpMailService {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base(base_url),
        }
    }
}

#[async_trait]
impl MailService for HttpMailService {
    async fn send(&self, email: &EmailSend) -> ServiceResult<()> {
        debug!(to = %email.to, "POST /emails");
        execute(self.client.post(format!("{}/emails", self.base_url)).json(email)).await
    }
}

pub struct HttpNotificationService {
    client: Client,
    base_url: String,
}

impl HttpNotificationService {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base(base_url),
        }
    }
}

#[async_trait]
impl NotificationService for HttpNotificationService {
    async fn create(&self, notification: &NotificationCreate) -> ServiceResult<()> {
        execute(
            self.client
                .post(format!("{}/notifications", self.base_url))
                .json(notification),
        )
        .await
    }
}

pub struct HttpOrderService {
    client: Client,
    base_url: String,
}

impl HttpOrderService {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base(base_url),
        }
    }
}

#[async_trait]
impl OrderService for HttpOrderService {
    async fn create_order(&self, order: &OrderCreate) -> ServiceResult<()> {
        execute(self.client.post(format!("{}/orders", self.base_url)).json(order)).await
    }
}

pub struct HttpSearchIndexService {
    client: Client,
    base_url: String,
}

impl HttpSearchIndexService {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base(base_url),
        }
    }

    fn index_url(&self, entity_type: IndexEntityType, id: Uuid) -> String {
        format!("{}/index/{}/{}", self.base_url, entity_type, id)
    }

    async fn index(&self, entity_type: IndexEntityType, id: Uuid) -> ServiceResult<()> {
        debug!(%entity_type, %id, "Requesting reindex");
        execute(self.client.post(self.index_url(entity_type, id))).await
    }
}

#[async_trait]
impl SearchIndexService for HttpSearchIndexService {
    async fn index_museum(&self, id: Uuid) -> ServiceResult<()> {
        self.index(IndexEntityType::Museum, id).await
    }

    async fn index_artifact(&self, id: Uuid) -> ServiceResult<()> {
        self.index(IndexEntityType::Artifact, id).await
    }

    async fn index_event(&self, id: Uuid) -> ServiceResult<()> {
        self.index(IndexEntityType::Event, id).await
    }

    async fn index_tour_online(&self, id: Uuid) -> ServiceResult<()> {
        self.index(IndexEntityType::TourOnline, id).await
    }

    async fn delete_from_index(&self, id: Uuid) -> ServiceResult<()> {
        execute(self.client.delete(format!("{}/index/{}", self.base_url, id))).await
    }
}
