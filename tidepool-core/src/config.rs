//! Runtime configuration.
//!
//! [`StreamSettings`] holds the plain values and is serde-friendly, so callers can
//! load it from whatever format they like. [`StreamConfig`] wraps the settings
//! together with the values that cannot be serialized: default codecs and the
//! deserialization failure handler.

use crate::error::StreamsError;
use crate::processors::{DeserializationHandler, fail_on_deserialization_error};
use crate::serdes::SerDes;
use crate::types::ProcessingGuarantee;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_COMMIT_INTERVAL_MS: u64 = 30_000;
const DEFAULT_EOS_COMMIT_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Consumer group id and prefix for every client id.
    pub application_id: String,
    /// Client id prefix; defaults to the application id when empty.
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_num_threads")]
    pub num_stream_threads: usize,
    /// Poll timeout while the thread is STARTING or RUNNING.
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    /// Periodic commit interval. `None` picks the guarantee's default.
    #[serde(default)]
    pub commit_interval_ms: Option<u64>,
    #[serde(default)]
    pub guarantee: ProcessingGuarantee,
    #[serde(default = "default_metadata_timeout_ms")]
    pub metadata_request_timeout_ms: u64,
}

fn default_num_threads() -> usize {
    1
}

fn default_poll_ms() -> u64 {
    100
}

fn default_metadata_timeout_ms() -> u64 {
    5_000
}

impl StreamSettings {
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            client_id: String::new(),
            num_stream_threads: default_num_threads(),
            poll_ms: default_poll_ms(),
            commit_interval_ms: None,
            guarantee: ProcessingGuarantee::default(),
            metadata_request_timeout_ms: default_metadata_timeout_ms(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.application_id.trim().is_empty() {
            return Err(StreamsError::Configuration("application_id must not be empty".into()).into());
        }
        if self.num_stream_threads == 0 {
            return Err(
                StreamsError::Configuration("num_stream_threads must be at least 1".into()).into(),
            );
        }
        if self.poll_ms == 0 {
            return Err(StreamsError::Configuration("poll_ms must be greater than 0".into()).into());
        }
        Ok(())
    }

    pub fn client_id(&self) -> &str {
        if self.client_id.is_empty() {
            &self.application_id
        } else {
            &self.client_id
        }
    }

    pub fn commit_interval(&self) -> Duration {
        let ms = self.commit_interval_ms.unwrap_or(match self.guarantee {
            ProcessingGuarantee::AtLeastOnce => DEFAULT_COMMIT_INTERVAL_MS,
            ProcessingGuarantee::ExactlyOnce => DEFAULT_EOS_COMMIT_INTERVAL_MS,
        });
        Duration::from_millis(ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn metadata_request_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_request_timeout_ms)
    }
}

/// Type-erased `Arc<dyn SerDes<T>>`.
type ErasedSerDes = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub struct StreamConfig {
    pub settings: StreamSettings,
    default_key_serdes: Option<ErasedSerDes>,
    default_value_serdes: Option<ErasedSerDes>,
    deserialization_handler: Option<DeserializationHandler>,
}

impl std::fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConfig")
            .field("settings", &self.settings)
            .field("default_key_serdes", &self.default_key_serdes.is_some())
            .field("default_value_serdes", &self.default_value_serdes.is_some())
            .field(
                "deserialization_handler",
                &self.deserialization_handler.is_some(),
            )
            .finish()
    }
}

impl StreamConfig {
    pub fn new(settings: StreamSettings) -> Self {
        Self {
            settings,
            default_key_serdes: None,
            default_value_serdes: None,
            deserialization_handler: None,
        }
    }

    pub fn with_default_key_serdes<T: 'static>(mut self, serdes: Arc<dyn SerDes<T>>) -> Self {
        self.default_key_serdes = Some(Arc::new(serdes));
        self
    }

    pub fn with_default_value_serdes<T: 'static>(mut self, serdes: Arc<dyn SerDes<T>>) -> Self {
        self.default_value_serdes = Some(Arc::new(serdes));
        self
    }

    pub fn with_deserialization_handler(mut self, handler: DeserializationHandler) -> Self {
        self.deserialization_handler = Some(handler);
        self
    }

    /// The default key codec, if one was configured for type `T`.
    pub fn default_key_serdes<T: 'static>(&self) -> Option<Arc<dyn SerDes<T>>> {
        downcast_serdes(self.default_key_serdes.as_ref())
    }

    pub fn default_value_serdes<T: 'static>(&self) -> Option<Arc<dyn SerDes<T>>> {
        downcast_serdes(self.default_value_serdes.as_ref())
    }

    /// The configured handler, or one that always answers FAIL.
    pub fn deserialization_handler(&self) -> DeserializationHandler {
        match &self.deserialization_handler {
            Some(handler) => handler.clone(),
            None => Arc::new(fail_on_deserialization_error),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.settings.validate()
    }
}

fn downcast_serdes<T: 'static>(erased: Option<&ErasedSerDes>) -> Option<Arc<dyn SerDes<T>>> {
    erased?.downcast_ref::<Arc<dyn SerDes<T>>>().cloned()
}
