//! lapin 기반 프로덕션 브로커 링크
//!
//! [`AmqpLink`]는 [`BrokerLink`] trait의 AMQP 0.9.1 구현입니다.
//! lapin 타입은 이 파일 밖으로 나가지 않습니다 -- 발행자는 trait만 봅니다.
//!
//! # 전달 태그 미러링
//!
//! 브로커는 채널마다 발행 순서대로 1부터 전달 태그를 부여합니다.
//! lapin은 발행별 confirm future를 돌려주므로, 링크가 자체 카운터로
//! 같은 태그를 미러링하고 confirm 해소를 단일 태그 Ack/Nack 이벤트로
//! 변환합니다. 발행은 드라이버 태스크 하나에서 순차적으로 일어나므로
//! 카운터와 브로커 태그가 일치합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions,
    ExchangeDeleteOptions, QueueBindOptions, QueueDeclareOptions, QueueDeleteOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use logpost_core::record::Record;

use crate::config::PublisherConfig;
use crate::error::PublishPipelineError;
use crate::link::{BrokerLink, LinkEvent, ProvisionRequest};

/// AMQP 정상 종료 응답 코드
const REPLY_SUCCESS: u16 = 200;

/// lapin 기반 브로커 링크
///
/// 연결/채널 상태는 내부에서 관리하며, `connect()`가 세션을 교체합니다.
///
/// # 사용 예시
/// ```ignore
/// use logpost_publish::{AmqpLink, PublisherConfig};
///
/// let link = AmqpLink::new(PublisherConfig::default());
/// let events = link.connect().await?;
/// # Ok::<(), logpost_publish::PublishPipelineError>(())
/// ```
pub struct AmqpLink {
    config: PublisherConfig,
    session: Mutex<Option<Session>>,
}

/// 활성 연결 한 개의 상태
struct Session {
    connection: Connection,
    channel: Channel,
    event_tx: mpsc::Sender<LinkEvent>,
    /// 에폭 내 전달 태그 카운터 (연결마다 0으로 리셋)
    tags: Arc<AtomicU64>,
}

impl AmqpLink {
    /// 설정으로 링크를 생성합니다. 연결은 `connect()` 호출 시 수립됩니다.
    pub fn new(config: PublisherConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }
}

impl BrokerLink for AmqpLink {
    async fn connect(&self) -> Result<mpsc::Receiver<LinkEvent>, PublishPipelineError> {
        let uri = self.config.amqp_uri();
        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|e| {
                PublishPipelineError::Connect(format!(
                    "broker connect to {}:{} failed: {e}",
                    self.config.host, self.config.port
                ))
            })?;

        let (event_tx, event_rx) = mpsc::channel(self.config.link_event_capacity);

        // lapin 내부 스레드에서 호출되므로 try_send를 사용한다
        let close_tx = event_tx.clone();
        connection.on_error(move |error| {
            let _ = close_tx.try_send(LinkEvent::Closed {
                reason: error.to_string(),
            });
        });

        let channel = connection.create_channel().await.map_err(|e| {
            PublishPipelineError::Connect(format!("channel open failed: {e}"))
        })?;

        debug!(
            host = %self.config.host,
            port = self.config.port,
            vhost = %self.config.vhost,
            "broker connection established"
        );

        let mut guard = self.session.lock().await;
        *guard = Some(Session {
            connection,
            channel,
            event_tx,
            tags: Arc::new(AtomicU64::new(0)),
        });
        Ok(event_rx)
    }

    async fn provision(&self, request: &ProvisionRequest) -> Result<(), PublishPipelineError> {
        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| PublishPipelineError::Provision("link not connected".to_owned()))?;

        // 짧은 수명의 제어 채널
        let control = session.connection.create_channel().await.map_err(|e| {
            PublishPipelineError::Provision(format!("control channel open failed: {e}"))
        })?;

        // 배타적 서버 명명 응답 queue
        let reply_queue = control
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                PublishPipelineError::Provision(format!("reply queue declare failed: {e}"))
            })?;
        let reply_name = reply_queue.name().as_str().to_owned();

        let mut consumer = control
            .basic_consume(
                &reply_name,
                "",
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| PublishPipelineError::Provision(format!("reply consume failed: {e}")))?;

        let correlation = Uuid::new_v4().to_string();
        let body = serde_json::to_vec(request)?;

        let properties = BasicProperties::default()
            .with_reply_to(reply_name.clone().into())
            .with_correlation_id(correlation.clone().into());

        control
            .basic_publish(
                "",
                &self.config.provision_queue,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .map_err(|e| {
                PublishPipelineError::Provision(format!("request publish failed: {e}"))
            })?;

        debug!(
            queue = %self.config.provision_queue,
            correlation = %correlation,
            "provisioning request sent"
        );

        // 상관 ID가 일치하는 응답이 올 때까지 소비 (시간 제한은 호출자가 건다)
        loop {
            let delivery = match consumer.next().await {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    return Err(PublishPipelineError::Provision(format!(
                        "reply consume error: {e}"
                    )));
                }
                None => {
                    return Err(PublishPipelineError::Provision(
                        "reply stream ended before response".to_owned(),
                    ));
                }
            };
            let matched = delivery
                .properties
                .correlation_id()
                .as_ref()
                .map(ShortString::as_str)
                == Some(correlation.as_str());
            if matched {
                debug!(bytes = delivery.data.len(), "provisioning response received");
                break;
            }
            trace!("discarding provisioning reply with mismatched correlation id");
        }

        if let Err(e) = control.close(REPLY_SUCCESS, "provisioning complete").await {
            debug!(error = %e, "control channel close failed");
        }
        Ok(())
    }

    async fn setup_topology(&self) -> Result<(), PublishPipelineError> {
        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| PublishPipelineError::Topology("link not connected".to_owned()))?;
        let channel = &session.channel;

        channel
            .exchange_declare(
                &self.config.exchange,
                exchange_kind(&self.config.exchange_type),
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                PublishPipelineError::Topology(format!("exchange declare failed: {e}"))
            })?;

        channel
            .queue_declare(
                &self.config.queue,
                QueueDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| PublishPipelineError::Topology(format!("queue declare failed: {e}")))?;

        channel
            .queue_bind(
                &self.config.queue,
                &self.config.exchange,
                &self.config.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| PublishPipelineError::Topology(format!("queue bind failed: {e}")))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| PublishPipelineError::Topology(format!("confirm select failed: {e}")))?;

        debug!(
            exchange = %self.config.exchange,
            queue = %self.config.queue,
            routing_key = %self.config.routing_key,
            "topology declared, delivery confirmations enabled"
        );
        Ok(())
    }

    async fn publish(&self, record: &Record) -> Result<u64, PublishPipelineError> {
        let body = record.to_json()?;
        let headers = header_table(record);

        let properties = BasicProperties::default()
            .with_app_id("logpost".into())
            .with_content_type("application/json".into())
            .with_headers(headers);

        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| PublishPipelineError::Publish("link not connected".to_owned()))?;

        let confirm = session
            .channel
            .basic_publish(
                &self.config.exchange,
                &self.config.routing_key,
                BasicPublishOptions::default(),
                body.as_bytes(),
                properties,
            )
            .await
            .map_err(|e| PublishPipelineError::Publish(format!("basic.publish failed: {e}")))?;

        let tag = session.tags.fetch_add(1, Ordering::Relaxed) + 1;

        // confirm은 발행별 future로 도착하므로 별도 태스크에서 기다렸다가
        // 단일 태그 이벤트로 변환한다
        let event_tx = session.event_tx.clone();
        tokio::spawn(async move {
            let event = match confirm.await {
                Ok(Confirmation::Ack(_)) => LinkEvent::Ack {
                    tag,
                    multiple: false,
                },
                Ok(Confirmation::Nack(_)) => LinkEvent::Nack {
                    tag,
                    multiple: false,
                },
                Ok(Confirmation::NotRequested) => {
                    trace!(tag, "confirmation not requested, treating as ack");
                    LinkEvent::Ack {
                        tag,
                        multiple: false,
                    }
                }
                Err(e) => {
                    warn!(tag, error = %e, "confirmation wait failed");
                    LinkEvent::Nack {
                        tag,
                        multiple: false,
                    }
                }
            };
            if event_tx.send(event).await.is_err() {
                trace!(tag, "confirmation receiver dropped");
            }
        });

        Ok(tag)
    }

    async fn unwind_topology(&self) -> Result<(), PublishPipelineError> {
        let guard = self.session.lock().await;
        let Some(session) = guard.as_ref() else {
            return Ok(());
        };
        let channel = &session.channel;

        channel
            .queue_unbind(
                &self.config.queue,
                &self.config.exchange,
                &self.config.routing_key,
                FieldTable::default(),
            )
            .await
            .map_err(|e| PublishPipelineError::Topology(format!("queue unbind failed: {e}")))?;

        channel
            .queue_delete(
                &self.config.queue,
                QueueDeleteOptions {
                    if_empty: true,
                    ..QueueDeleteOptions::default()
                },
            )
            .await
            .map_err(|e| PublishPipelineError::Topology(format!("queue delete failed: {e}")))?;

        channel
            .exchange_delete(&self.config.exchange, ExchangeDeleteOptions::default())
            .await
            .map_err(|e| {
                PublishPipelineError::Topology(format!("exchange delete failed: {e}"))
            })?;

        debug!(
            exchange = %self.config.exchange,
            queue = %self.config.queue,
            "topology unwound"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), PublishPipelineError> {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.take() else {
            return Ok(());
        };

        if let Err(e) = session.channel.close(REPLY_SUCCESS, "shutting down").await {
            debug!(error = %e, "channel close failed");
        }
        session
            .connection
            .close(REPLY_SUCCESS, "shutting down")
            .await
            .map_err(|e| PublishPipelineError::Connect(format!("connection close failed: {e}")))?;
        debug!("broker connection closed");
        Ok(())
    }
}

fn exchange_kind(kind: &str) -> ExchangeKind {
    match kind {
        "fanout" => ExchangeKind::Fanout,
        "topic" => ExchangeKind::Topic,
        "headers" => ExchangeKind::Headers,
        // 설정 검증이 화이트리스트를 강제하므로 나머지는 direct
        _ => ExchangeKind::Direct,
    }
}

/// 레코드의 와이어 JSON을 AMQP 헤더 테이블로 비춥니다.
fn header_table(record: &Record) -> FieldTable {
    let mut table = FieldTable::default();
    if let serde_json::Value::Object(map) = record.to_value() {
        for (key, value) in map {
            if let Some(amqp) = amqp_value(&value) {
                table.insert(key.into(), amqp);
            }
        }
    }
    table
}

fn amqp_value(value: &serde_json::Value) -> Option<AMQPValue> {
    match value {
        serde_json::Value::String(s) => Some(AMQPValue::LongString(LongString::from(s.clone()))),
        serde_json::Value::Bool(b) => Some(AMQPValue::Boolean(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(AMQPValue::LongLongInt(i))
            } else {
                n.as_f64().map(AMQPValue::Double)
            }
        }
        // 규칙 검증이 스칼라 속성만 허용하므로 나머지는 생략
        _ => None,
    }
}
