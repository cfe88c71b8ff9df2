use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Severity of a shipped record. The sink only ever sees these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Error => "error",
        }
    }
}

/// One structured log entry bound for the external sink.
///
/// Serializes to a flat JSON object: the fixed envelope first, then the
/// caller's metadata merged over it. Metadata keys that collide with
/// envelope keys win.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub service: String,
    pub function_name: String,
    pub request_id: String,
    pub metadata: Map<String, Value>,
}

impl LogRecord {
    /// Build a record stamped with the current time.
    ///
    /// `metadata` is flattened when it is a JSON object, dropped when it
    /// is `null`, and kept under a `metadata` key otherwise.
    pub fn new(
        level: LogLevel,
        message: impl Into<String>,
        service: impl Into<String>,
        function_name: impl Into<String>,
        request_id: impl Into<String>,
        metadata: Value,
    ) -> Self {
        let metadata = match metadata {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("metadata".to_string(), other);
                map
            }
        };

        LogRecord {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            service: service.into(),
            function_name: function_name.into(),
            request_id: request_id.into(),
            metadata,
        }
    }

    /// The envelope merged with metadata, as sent over the wire.
    pub fn to_entry(&self) -> Map<String, Value> {
        let mut entry = Map::new();
        entry.insert("timestamp".into(), Value::String(format_timestamp(&self.timestamp)));
        entry.insert("level".into(), Value::String(self.level.as_str().to_string()));
        entry.insert("message".into(), Value::String(self.message.clone()));
        entry.insert("service".into(), Value::String(self.service.clone()));
        entry.insert("function_name".into(), Value::String(self.function_name.clone()));
        entry.insert("request_id".into(), Value::String(self.request_id.clone()));

        for (key, value) in &self.metadata {
            entry.insert(key.clone(), value.clone());
        }
        entry
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_entry().serialize(serializer)
    }
}

/// UTC ISO-8601 with microseconds and a trailing `Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in the same format as shipped records.
pub fn now_timestamp() -> String {
    format_timestamp(&Utc::now())
}
