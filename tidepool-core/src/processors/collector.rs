use super::*;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands records produced by sink nodes to the task's producer.
pub struct RecordCollector {
    producer: Arc<dyn Producer>,
    log_prefix: String,
    sent: AtomicU64,
}

impl RecordCollector {
    pub fn new(producer: Arc<dyn Producer>, log_prefix: impl Into<String>) -> Self {
        Self {
            producer,
            log_prefix: log_prefix.into(),
            sent: AtomicU64::new(0),
        }
    }

    pub fn send(&self, record: ProducerRecord) -> Result<()> {
        let topic = record.topic.clone();
        self.producer.send(record).map_err(|e| {
            error!("{}error sending record to topic {topic}: {e}", self.log_prefix);
            e
        })?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout)
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn producer(&self) -> &Arc<dyn Producer> {
        &self.producer
    }
}
