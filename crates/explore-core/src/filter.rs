//! Document-level search filters

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Document;

/// Restricts search results to a set of sources and an inclusive date range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Keep only these sources (`None` keeps every source)
    pub sources: Option<Vec<String>>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_date_from(mut self, date: NaiveDate) -> Self {
        self.date_from = Some(date);
        self
    }

    pub fn with_date_to(mut self, date: NaiveDate) -> Self {
        self.date_to = Some(date);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_none() && self.date_from.is_none() && self.date_to.is_none()
    }

    /// Reject an inverted date range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(ConfigError::InvalidDateRange { from, to });
            }
        }
        Ok(())
    }

    /// Whether a document passes every filter
    ///
    /// A document without a date fails any date bound.
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(sources) = &self.sources {
            if !sources.iter().any(|s| s == &doc.source) {
                return false;
            }
        }
        if self.date_from.is_none() && self.date_to.is_none() {
            return true;
        }
        let Some(date) = doc.episode_date else {
            return false;
        };
        self.date_from.map_or(true, |from| date >= from) && self.date_to.map_or(true, |to| date <= to)
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(s: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| ConfigError::InvalidDate(s.to_string()))
}
