use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::type_utils::ArqRead;

/// A timestamp with a one-byte presence flag on the wire. An absent date
/// decodes to zero milliseconds and stays zero all the way up.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Date {
    pub milliseconds_since_epoch: u64,
}

impl Date {
    pub fn new<R: ArqRead>(mut reader: R) -> Result<Date> {
        let present = reader.read_bytes(1)?;
        let milliseconds_since_epoch = if present[0] == 0x01 {
            reader.read_arq_u64()?
        } else {
            0
        };

        Ok(Date {
            milliseconds_since_epoch,
        })
    }
}

impl std::fmt::Display for Date {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let seconds = (self.milliseconds_since_epoch / 1000) as i64;
        match DateTime::<Utc>::from_timestamp(seconds, 0) {
            Some(datetime) => write!(f, "{}", datetime),
            None => write!(f, "<invalid date>"),
        }
    }
}
