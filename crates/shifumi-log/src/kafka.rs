//! Kafka [`EventLog`] implementation via `rdkafka`.

use std::time::Duration;

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};

use crate::{EventLog, LogError, LogReader, Record, StartFrom};

/// Connection settings for [`KafkaLog`].
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Comma-separated `host:port` list.
    pub brokers: String,
    /// Partitions for topics this log creates.
    pub partitions: i32,
    /// Replication factor for topics this log creates.
    pub replication: i32,
    /// How long an append may wait for the broker acknowledgement.
    pub send_timeout: Duration,
    /// Timeout for metadata requests (watermarks).
    pub metadata_timeout: Duration,
    /// Group ID used by readers that don't belong to a consumer group.
    pub scan_group: String,
}

impl KafkaConfig {
    /// Settings for `brokers` with single-partition defaults.
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            partitions: 1,
            replication: 1,
            send_timeout: Duration::from_secs(5),
            metadata_timeout: Duration::from_secs(5),
            scan_group: "shifumi-snapshot-scan".to_string(),
        }
    }
}

/// The production log.
pub struct KafkaLog {
    config: KafkaConfig,
    producer: FutureProducer,
    admin: AdminClient<DefaultClientContext>,
}

impl KafkaLog {
    /// Creates the producer and admin clients.
    ///
    /// This does not contact the broker; unreachable brokers surface on
    /// the first append or topic creation.
    pub fn connect(config: KafkaConfig) -> Result<Self, LogError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            // Snapshots must reach readers quickly, don't wait to batch.
            .set("linger.ms", "0")
            .set(
                "message.timeout.ms",
                config.send_timeout.as_millis().to_string(),
            )
            .create()
            .map_err(|e| LogError::Unavailable(e.to_string()))?;

        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .create()
            .map_err(|e| LogError::Unavailable(e.to_string()))?;

        tracing::info!(brokers = %config.brokers, "kafka clients created");
        Ok(Self {
            config,
            producer,
            admin,
        })
    }

    fn consumer_config(&self, group: &str, auto_commit: bool) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.config.brokers)
            .set("group.id", group)
            .set("enable.auto.commit", auto_commit.to_string())
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false");
        config
    }
}

impl EventLog for KafkaLog {
    type Reader = KafkaReader;

    async fn create_topic(&self, topic: &str) -> Result<(), LogError> {
        let new_topic = NewTopic::new(
            topic,
            self.config.partitions,
            TopicReplication::Fixed(self.config.replication),
        );
        let results = self
            .admin
            .create_topics([&new_topic], &AdminOptions::new())
            .await
            .map_err(|e| LogError::Unavailable(e.to_string()))?;

        for result in results {
            match result {
                Ok(name) => tracing::info!(topic = %name, "topic created"),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    tracing::debug!(topic = %name, "topic already exists");
                }
                Err((name, code)) => {
                    return Err(LogError::CreateTopic {
                        topic: name,
                        reason: code.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn append(
        &self,
        topic: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<u64, LogError> {
        let record = FutureRecord::to(topic).key(key).payload(value);
        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(self.config.send_timeout))
            .await
            .map_err(|(e, _)| LogError::Append {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;
        tracing::trace!(topic, partition, offset, "record acknowledged");
        Ok(offset.max(0) as u64)
    }

    async fn end_offset(&self, topic: &str) -> Result<u64, LogError> {
        let config =
            self.consumer_config(&self.config.scan_group, false);
        let timeout = self.config.metadata_timeout;
        let name = topic.to_string();

        // `fetch_watermarks` blocks the calling thread.
        let watermarks = tokio::task::spawn_blocking(move || {
            let consumer: BaseConsumer = config.create()?;
            consumer.fetch_watermarks(&name, 0, timeout)
        })
        .await
        .map_err(|e| LogError::Read {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;

        match watermarks {
            Ok((_low, high)) => Ok(high.max(0) as u64),
            Err(KafkaError::MetadataFetch(
                RDKafkaErrorCode::UnknownTopicOrPartition
                | RDKafkaErrorCode::UnknownTopic
                | RDKafkaErrorCode::UnknownPartition,
            )) => Err(LogError::UnknownTopic(topic.to_string())),
            Err(e) => Err(LogError::Read {
                topic: topic.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn reader(
        &self,
        topic: &str,
        start: StartFrom,
    ) -> Result<KafkaReader, LogError> {
        let unavailable = |e: KafkaError| LogError::Unavailable(e.to_string());

        let consumer: StreamConsumer = match &start {
            StartFrom::Group(group) => {
                let consumer: StreamConsumer = self
                    .consumer_config(group, true)
                    .create()
                    .map_err(unavailable)?;
                consumer.subscribe(&[topic]).map_err(unavailable)?;
                consumer
            }
            StartFrom::Earliest | StartFrom::Latest => {
                let offset = if start == StartFrom::Earliest {
                    Offset::Beginning
                } else {
                    Offset::End
                };
                let consumer: StreamConsumer = self
                    .consumer_config(&self.config.scan_group, false)
                    .create()
                    .map_err(unavailable)?;
                let mut assignment = TopicPartitionList::new();
                assignment
                    .add_partition_offset(topic, 0, offset)
                    .map_err(unavailable)?;
                consumer.assign(&assignment).map_err(unavailable)?;
                consumer
            }
        };

        tracing::debug!(topic, ?start, "kafka reader opened");
        Ok(KafkaReader {
            consumer,
            topic: topic.to_string(),
        })
    }
}

/// A reader over one Kafka topic.
pub struct KafkaReader {
    consumer: StreamConsumer,
    topic: String,
}

impl LogReader for KafkaReader {
    async fn next(&mut self) -> Result<Option<Record>, LogError> {
        let message = self.consumer.recv().await.map_err(|e| LogError::Read {
            topic: self.topic.clone(),
            reason: e.to_string(),
        })?;

        Ok(Some(Record {
            topic: message.topic().to_string(),
            offset: message.offset().max(0) as u64,
            key: message.key().map(<[u8]>::to_vec).unwrap_or_default(),
            value: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        }))
    }
}
