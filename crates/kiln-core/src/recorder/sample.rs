use time::OffsetDateTime;

use kiln_model::Labels;

/// One recorded operation outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub operation_type: String,
    pub duration_seconds: f64,
    pub success: bool,
    pub timestamp: OffsetDateTime,
    pub tags: Labels,
}

impl MetricSample {
    /// Sample stamped with the current UTC time and no tags.
    pub fn new(operation_type: impl Into<String>, duration_seconds: f64, success: bool) -> Self {
        Self {
            operation_type: operation_type.into(),
            duration_seconds,
            success,
            timestamp: OffsetDateTime::now_utc(),
            tags: Labels::new(),
        }
    }

    pub fn with_tags(mut self, tags: Labels) -> Self {
        self.tags = tags;
        self
    }

    pub fn at(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}
