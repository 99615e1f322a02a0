//! Publication policy
//!
//! Decides whether a fetched channel value reaches the metrics sink.

use crate::channel::ChannelValue;

/// How a channel value is published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Publication {
    /// Publish any numeric value
    #[default]
    Plain,
    /// Publish only values strictly greater than zero.
    ///
    /// Used for lifetime energy counters: the device reports `0` until the
    /// counter is initialised, and publishing it would look like a reset.
    SuppressNonPositive,
}

impl Publication {
    /// Value to publish, or None to leave the gauge unset
    pub fn select(&self, value: &ChannelValue) -> Option<f64> {
        let numeric = value.numeric()?;
        match self {
            Publication::Plain => Some(numeric),
            Publication::SuppressNonPositive if numeric > 0.0 => Some(numeric),
            Publication::SuppressNonPositive => None,
        }
    }
}
