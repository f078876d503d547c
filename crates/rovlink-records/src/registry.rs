use std::collections::HashMap;

use rovlink_frame::{category, Frame};
use tracing::debug;

use crate::config::RecordConfig;
use crate::error::{RecordError, Result};
use crate::record::{
    Ack, EncoderReport, ForceReport, HotspotRequest, ImuReport, PowerReport, RangeReport, Ready,
    Record, SafetyReport, ServoReport, ShutdownRequest,
};

/// Parser for one category. The field count has already been checked.
pub type ParseFn = fn(&Frame, &RecordConfig) -> Result<Record>;

#[derive(Clone, Copy)]
struct Entry {
    min_fields: usize,
    parse: ParseFn,
}

/// Category-keyed table of record parsers.
pub struct RecordRegistry {
    entries: HashMap<String, Entry>,
    config: RecordConfig,
}

impl RecordRegistry {
    /// Create an empty registry.
    pub fn new(config: RecordConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
        }
    }

    /// Registry with a parser for every device → host category.
    pub fn standard(config: RecordConfig) -> Self {
        let mut registry = Self::new(config);
        registry.register(category::ENCODER, EncoderReport::FIELDS, |f, _| {
            EncoderReport::parse(f).map(Record::Encoder)
        });
        registry.register(category::TOF, RangeReport::FIELDS, |f, _| {
            RangeReport::parse(f).map(Record::Range)
        });
        registry.register(category::IMU, ImuReport::FIELDS, |f, _| {
            ImuReport::parse(f).map(Record::Imu)
        });
        registry.register(category::FSR, ForceReport::FIELDS, |f, _| {
            ForceReport::parse(f).map(Record::Force)
        });
        registry.register(category::POWER, PowerReport::FIELDS, |f, _| {
            PowerReport::parse(f).map(Record::Power)
        });
        registry.register(category::ACK, Ack::FIELDS, |f, _| {
            Ack::parse(f).map(Record::Ack)
        });
        registry.register(category::SAFETY, SafetyReport::FIELDS, |f, _| {
            SafetyReport::parse(f).map(Record::Safety)
        });
        registry.register(category::SERVO, 1 + config.servo_count, |f, c| {
            ServoReport::parse(f, c).map(Record::Servo)
        });
        registry.register(category::READY, Ready::FIELDS, |f, _| {
            Ready::parse(f).map(Record::Ready)
        });
        registry.register(category::SHUTDOWN, ShutdownRequest::FIELDS, |f, _| {
            ShutdownRequest::parse(f).map(Record::Shutdown)
        });
        registry.register(category::HOTSPOT, HotspotRequest::FIELDS, |f, _| {
            HotspotRequest::parse(f).map(Record::Hotspot)
        });
        registry
    }

    /// Register or replace the parser for `category`.
    pub fn register(&mut self, category: &str, min_fields: usize, parse: ParseFn) {
        self.entries
            .insert(category.to_string(), Entry { min_fields, parse });
    }

    /// Parse a frame into a record.
    ///
    /// The field count is checked before the parser runs, so a short frame
    /// never produces a partially filled record.
    pub fn parse(&self, frame: &Frame) -> Result<Record> {
        let entry = self.entries.get(&frame.category).ok_or_else(|| {
            debug!(category = %frame.category, "no parser for category");
            RecordError::UnknownCategory(frame.category.clone())
        })?;

        if frame.field_count() < entry.min_fields {
            return Err(RecordError::MissingSegment {
                category: frame.category.clone(),
                index: frame.field_count(),
            });
        }

        (entry.parse)(frame, &self.config)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.entries.contains_key(category)
    }

    /// Minimum field count for `category`, if registered.
    pub fn min_fields(&self, category: &str) -> Option<usize> {
        self.entries.get(category).map(|e| e.min_fields)
    }

    /// Registered categories, sorted.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        categories.sort_unstable();
        categories
    }

    pub fn config(&self) -> &RecordConfig {
        &self.config
    }
}

impl Default for RecordRegistry {
    fn default() -> Self {
        Self::standard(RecordConfig::default())
    }
}
