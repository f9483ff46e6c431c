use byteorder::{NetworkEndian, ReadBytesExt};
use std::io::Read;

use crate::date::Date;
use crate::error::{Error, Result};

/// Typed readers over a forward byte cursor. All integers are big-endian;
/// strings and dates carry a one-byte presence flag.
pub trait ArqRead {
    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>>;
    fn read_arq_string(&mut self) -> Result<String>;
    fn read_arq_sha1(&mut self) -> Result<Option<[u8; 20]>>;
    fn read_arq_bool(&mut self) -> Result<bool>;
    fn read_arq_u32(&mut self) -> Result<u32>;
    fn read_arq_i32(&mut self) -> Result<i32>;
    fn read_arq_u64(&mut self) -> Result<u64>;
    fn read_arq_i64(&mut self) -> Result<i64>;
    fn read_arq_data(&mut self) -> Result<Vec<u8>>;
    fn read_arq_date(&mut self) -> Result<Date>;
}

impl<T> ArqRead for T
where
    T: Read,
{
    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0; count];
        self.read_exact(&mut buffer[..])?;
        Ok(buffer)
    }

    fn read_arq_string(&mut self) -> Result<String> {
        let present = self.read_bytes(1)?;

        Ok(if present[0] == 0x01 {
            let strlen = self.read_u64::<NetworkEndian>()?;
            let data_bytes = self.read_bytes(strlen as usize)?;
            std::str::from_utf8(&data_bytes)?.to_string()
        } else {
            String::new()
        })
    }

    /// A 40-character hex string decoded to 20 bytes. An absent string, or a
    /// present-but-empty one, means "no hash".
    fn read_arq_sha1(&mut self) -> Result<Option<[u8; 20]>> {
        let text = self.read_arq_string()?;
        if text.is_empty() {
            return Ok(None);
        }
        let decoded = hex::decode(&text)?;
        let sha1: [u8; 20] = decoded
            .try_into()
            .map_err(|_| Error::ParseError(format!("hash {:?} is not 20 bytes", text)))?;
        Ok(Some(sha1))
    }

    fn read_arq_bool(&mut self) -> Result<bool> {
        let flag = self.read_bytes(1)?;
        Ok(flag[0] == 0x01)
    }

    fn read_arq_u32(&mut self) -> Result<u32> {
        Ok(self.read_u32::<NetworkEndian>()?)
    }

    fn read_arq_i32(&mut self) -> Result<i32> {
        Ok(self.read_i32::<NetworkEndian>()?)
    }

    fn read_arq_u64(&mut self) -> Result<u64> {
        Ok(self.read_u64::<NetworkEndian>()?)
    }

    fn read_arq_i64(&mut self) -> Result<i64> {
        Ok(self.read_i64::<NetworkEndian>()?)
    }

    fn read_arq_data(&mut self) -> Result<Vec<u8>> {
        let datalen = self.read_u64::<NetworkEndian>()?;
        let data_bytes = self.read_bytes(datalen as usize)?;
        Ok(data_bytes)
    }

    fn read_arq_date(&mut self) -> Result<Date> {
        Date::new(self)
    }
}
