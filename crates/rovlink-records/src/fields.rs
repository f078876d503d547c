use std::str::FromStr;

use rovlink_frame::Frame;

use crate::error::{RecordError, Result};

/// Typed positional access to a frame's fields.
pub(crate) struct FieldReader<'a> {
    frame: &'a Frame,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(frame: &'a Frame) -> Self {
        Self { frame }
    }

    pub(crate) fn parse<T: FromStr>(&self, index: usize) -> Result<T> {
        let raw = self.raw(index)?;
        raw.trim().parse().map_err(|_| RecordError::InvalidField {
            category: self.frame.category.clone(),
            index,
            value: raw.to_string(),
        })
    }

    /// Float field that must be finite; "NaN" and "inf" parse but are refused.
    pub(crate) fn finite(&self, index: usize) -> Result<f64> {
        let value: f64 = self.parse(index)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.invalid(index))
        }
    }

    /// Integer field read as a boolean; any nonzero value is true.
    pub(crate) fn flag(&self, index: usize) -> Result<bool> {
        Ok(self.parse::<i64>(index)? != 0)
    }

    pub(crate) fn text(&self, index: usize) -> Result<String> {
        self.raw(index).map(str::to_string)
    }

    pub(crate) fn invalid(&self, index: usize) -> RecordError {
        RecordError::InvalidField {
            category: self.frame.category.clone(),
            index,
            value: self.frame.field(index).unwrap_or_default().to_string(),
        }
    }

    fn raw(&self, index: usize) -> Result<&'a str> {
        self.frame
            .field(index)
            .map_err(|_| RecordError::MissingSegment {
                category: self.frame.category.clone(),
                index,
            })
    }
}
