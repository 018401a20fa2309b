use serde::{Deserialize, Serialize};

/// Event or wall-clock time in milliseconds since epoch.
pub type Timestamp = i64;

/// Offset of a record inside a partition.
pub type Offset = i64;

/// A topic name plus a partition number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: u32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl std::fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// A position inside a topic partition, used for commits and seeks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicPartitionOffset {
    pub topic_partition: TopicPartition,
    pub offset: Offset,
}

impl TopicPartitionOffset {
    pub fn new(topic_partition: TopicPartition, offset: Offset) -> Self {
        Self {
            topic_partition,
            offset,
        }
    }
}

/// A raw record as returned by the log transport.
///
/// Key and value are opaque bytes; decoding happens in the source node of the
/// processor graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedRecord {
    pub topic: String,
    pub partition: u32,
    pub offset: Offset,
    pub timestamp: Timestamp,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl ConsumedRecord {
    /// Create a record with no headers.
    pub fn new(
        topic_partition: &TopicPartition,
        offset: Offset,
        timestamp: Timestamp,
        key: Vec<u8>,
        value: Vec<u8>,
    ) -> Self {
        Self {
            topic: topic_partition.topic.clone(),
            partition: topic_partition.partition,
            offset,
            timestamp,
            key,
            value,
            headers: Vec::new(),
        }
    }

    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}

/// Identifies a task: the topology sub-group it executes plus the partition
/// number it owns across that group's source topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId {
    pub topic_group: u32,
    pub partition: u32,
}

impl TaskId {
    pub fn new(topic_group: u32, partition: u32) -> Self {
        Self {
            topic_group,
            partition,
        }
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.topic_group, self.partition)
    }
}

/// Delivery guarantee for committed progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingGuarantee {
    /// One producer shared by every task of a thread; records may be reprocessed
    /// after a failure.
    #[default]
    AtLeastOnce,
    /// One transactional producer per task; offsets commit inside the
    /// producer transaction.
    ExactlyOnce,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId::new(0, 3).to_string(), "0_3");
        assert_eq!(TaskId::new(2, 11).to_string(), "2_11");
    }

    #[test]
    fn test_task_id_ordering_groups_first() {
        let mut ids = vec![TaskId::new(1, 0), TaskId::new(0, 2), TaskId::new(0, 1)];
        ids.sort();
        assert_eq!(
            ids,
            vec![TaskId::new(0, 1), TaskId::new(0, 2), TaskId::new(1, 0)]
        );
    }

    #[test]
    fn test_topic_partition_display() {
        let tp = TopicPartition::new("orders", 4);
        assert_eq!(tp.to_string(), "orders-4");
    }

    #[test]
    fn test_consumed_record_topic_partition() {
        let tp = TopicPartition::new("clicks", 1);
        let record = ConsumedRecord::new(&tp, 42, 1000, b"k".to_vec(), b"v".to_vec());
        assert_eq!(record.topic_partition(), tp);
        assert_eq!(record.offset, 42);
        assert!(record.headers.is_empty());
    }

    #[test]
    fn test_guarantee_default_is_at_least_once() {
        assert_eq!(
            ProcessingGuarantee::default(),
            ProcessingGuarantee::AtLeastOnce
        );
    }
}
