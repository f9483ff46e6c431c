use serde::Deserialize;

use crate::error::Result;

/// Contains metadata information with user name and computer name.
///
/// This is so that you can identify which backup set is which when you browse
/// the backup sets in your storage account.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputerInfo {
    pub user_name: String,
    pub computer_name: String,
    /// uuid is not part of the plist; it is the backup set's directory name.
    #[serde(skip)]
    pub uuid: String,
}

impl ComputerInfo {
    /// Deserializes a `computerinfo` plist (XML or binary).
    pub fn from_bytes(bytes: &[u8], uuid: &str) -> Result<ComputerInfo> {
        let mut computer_info: ComputerInfo = plist::from_bytes(bytes)?;
        computer_info.uuid = uuid.to_string();
        Ok(computer_info)
    }
}
