pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Ciphertext length, PKCS#7 padding, or post-decrypt parsing is wrong.
    /// Most often the supplied password is wrong.
    BadDecrypt(String),
    /// A pack file's trailing SHA-1 footer does not match its contents.
    CorruptPack(String),
    UnknownBlobType(String),
    BadVersion(String),
    /// An object frame declares more payload bytes than the pack contains.
    TruncatedObject(String),
    PathOutsideCommit { target: String, root: String },
    PathNotFound(String),
    /// The hash is in no pack index and has no loose object.
    BlobNotFound(String),
    Remote(String),
    Cipher,
    ParseError(String),
    ConversionError(std::str::Utf8Error),
    IoError(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Error::BadDecrypt(ref msg) => write!(f, "decryption failed ({}); wrong password?", msg),
            Error::CorruptPack(ref path) => write!(f, "pack file {} fails its SHA-1 footer check", path),
            Error::UnknownBlobType(ref tag) => write!(f, "unknown blob type tag {:?}", tag),
            Error::BadVersion(ref header) => write!(f, "blob header {:?} has a bad version", header),
            Error::TruncatedObject(ref msg) => write!(f, "truncated object: {}", msg),
            Error::PathOutsideCommit { ref target, ref root } => {
                write!(f, "path {} is not located within commit path {}", target, root)
            }
            Error::PathNotFound(ref path) => write!(f, "path {} not found in backup", path),
            Error::BlobNotFound(ref sha1) => write!(f, "blob {} not found in any pack or loose object", sha1),
            Error::Remote(ref msg) => write!(f, "object store error: {}", msg),
            Error::Cipher => write!(f, "cipher construction failed"),
            Error::ParseError(ref msg) => write!(f, "parse error: {}", msg),
            Error::ConversionError(ref err) => write!(f, "{}", err),
            Error::IoError(ref err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::ConversionError(ref err) => Some(err),
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl std::convert::From<aes::cipher::InvalidLength> for Error {
    fn from(_error: aes::cipher::InvalidLength) -> Error {
        Error::Cipher
    }
}

impl std::convert::From<aes::cipher::block_padding::UnpadError> for Error {
    fn from(_error: aes::cipher::block_padding::UnpadError) -> Error {
        Error::BadDecrypt("invalid PKCS#7 padding".to_string())
    }
}

impl std::convert::From<plist::Error> for Error {
    fn from(error: plist::Error) -> Error {
        Error::ParseError(error.to_string())
    }
}

impl std::convert::From<hex::FromHexError> for Error {
    fn from(error: hex::FromHexError) -> Error {
        Error::ParseError(error.to_string())
    }
}

impl std::convert::From<std::str::Utf8Error> for Error {
    fn from(error: std::str::Utf8Error) -> Error {
        Error::ConversionError(error)
    }
}

impl std::convert::From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error {
        Error::IoError(error)
    }
}
