//! Send emails to users, through a RabbitMQ queue consumed by a mailer.

use std::borrow::Cow;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::uri::{
    AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo,
};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use serde::Serialize;
use url::Url;

use crate::config::Mail;
use crate::error::{Result, ServerError};

const DEFAULT_AMPQ_HOST: &str = "localhost";
const DEFAULT_AMPQ_PORT: u16 = 5672;
const DEFAULT_AMPQ_VHOST: &str = "/";

const CONTENT_ENCODING: &str = "utf8";
const CONTENT_TYPE: &str = "application/cloudevents+json";
const DATA_CONTENT_TYPE: &str = "application/json";
const CLOUDEVENT_VERSION: &str = "1.0";
const EVENT_TYPE: &str = "community.email";
const EVENT_SOURCE: &str = "community.accounts";
const ID_LENGTH: usize = 12;

/// Notification port.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send an email to `to`.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct Cloudevent<'a> {
    specversion: &'static str,
    r#type: &'static str,
    source: &'static str,
    id: String,
    time: String,
    datacontenttype: &'static str,
    data: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    to: Cow<'a, str>,
    subject: Cow<'a, str>,
    body: Cow<'a, str>,
}

/// RabbitMQ publisher.
///
/// Without connection, every notification is logged in full then dropped,
/// so activation links stay reachable from the logs.
#[derive(Debug, Clone, Default)]
pub struct MailManager {
    queue: String,
    conn: Option<Arc<Connection>>,
}

impl MailManager {
    /// Create a new [`MailManager`].
    pub async fn new(config: &Mail) -> Result<Self> {
        let addr = Url::parse(&config.address)?;
        let uri = AMQPUri {
            scheme: AMQPScheme::from_str(addr.scheme())
                .map_err(|_| ServerError::InvalidScheme)?,
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: config.username.clone(),
                    password: config.password.clone(),
                },
                host: addr.host_str().unwrap_or(DEFAULT_AMPQ_HOST).into(),
                port: addr.port().unwrap_or(DEFAULT_AMPQ_PORT),
            },
            vhost: config
                .vhost
                .clone()
                .unwrap_or(DEFAULT_AMPQ_VHOST.to_string()),
            query: AMQPQueryString {
                channel_max: config.pool,
                ..Default::default()
            },
        };

        let conn_config = ConnectionProperties::default()
            .with_connection_name("greate_accounts_mailer".into());
        let conn = Connection::connect_uri(uri, conn_config).await?;

        tracing::info!(%addr, queue = config.queue, "rabbitmq connected");

        Ok(Self {
            queue: config.queue.clone(),
            conn: Some(Arc::new(conn)),
        })
    }

    async fn create_channel(
        conn: Arc<Connection>,
        queue: &str,
    ) -> Result<Channel> {
        let channel = conn.create_channel().await?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(channel)
    }

    fn create_event(data: Content) -> Cloudevent {
        let id = Alphanumeric.sample_string(&mut OsRng, ID_LENGTH);
        Cloudevent {
            specversion: CLOUDEVENT_VERSION,
            r#type: EVENT_TYPE,
            source: EVENT_SOURCE,
            id,
            time: Utc::now().to_rfc3339(),
            datacontenttype: DATA_CONTENT_TYPE,
            data,
        }
    }
}

#[async_trait]
impl Notifier for MailManager {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let Some(conn) = &self.conn else {
            tracing::warn!(
                to,
                subject,
                body,
                "no mail transport, email logged instead of sent"
            );
            return Ok(());
        };
        let channel =
            Self::create_channel(Arc::clone(conn), &self.queue).await?;

        let payload = Self::create_event(Content {
            to: Cow::from(to),
            subject: Cow::from(subject),
            body: Cow::from(body),
        });
        let payload = serde_json::to_vec(&payload)?;

        channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_encoding(CONTENT_ENCODING.into())
                    .with_content_type(CONTENT_TYPE.into()),
            )
            .await?;

        tracing::trace!(to, subject, "email event sent");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn test_cloudevent() {
        let event = MailManager::create_event(Content {
            to: Cow::from("a@x.com"),
            subject: Cow::from("Activate your account"),
            body: Cow::from("<p>hi</p>"),
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["specversion"], "1.0");
        assert_eq!(json["type"], "community.email");
        assert_eq!(json["id"].as_str().unwrap().len(), ID_LENGTH);
        assert_eq!(json["data"]["to"], "a@x.com");
        assert_eq!(json["data"]["subject"], "Activate your account");
        assert_eq!(json["data"]["body"], "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_send_without_transport_logs_email() {
        let (events, _guard) = crate::capture_events();

        let body = r#"<a href="http://localhost/activation/1/code">activate</a>"#;
        let mail = MailManager::default();
        assert!(mail.send("a@x.com", "Activate your account", body).await.is_ok());

        let events = events.lock().unwrap();
        let (level, fields) = events
            .iter()
            .find(|(_, fields)| fields.get("to").map(String::as_str) == Some("a@x.com"))
            .expect("dropped email is logged");
        assert_eq!(*level, Level::WARN);
        assert_eq!(fields["subject"], "Activate your account");
        assert_eq!(fields["body"], body);
    }
}
