#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum FetchError {
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("Device returned no data")]
    Empty,

    #[error("Configuration header too short to carry a total length")]
    TruncatedHeader,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("'{0}' is not a hex byte")]
    BadToken(String),

    #[error("No descriptor bytes in the input")]
    Empty,
}
