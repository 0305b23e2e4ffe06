//! Error handling for the pitemp crate.

/// A specialized `Result` type for pitemp operations.
pub type Result<T> = std::result::Result<T, PitempError>;

/// The main error type for pitemp.
#[derive(Debug, thiserror::Error)]
pub enum PitempError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sensor read failed after exhausting its retries
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// Fetching the peer's reading failed
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// A peer response could not be decoded
    #[error("Failed to decode reading: {0}")]
    Decode(String),

    /// Network interface lookup failed
    #[error("Network error: {0}")]
    Network(String),

    /// Writing a frame to a display failed
    #[error("Display error: {0}")]
    Display(String),

    /// Opening a display at startup failed
    #[error("Display initialization failed: {0}")]
    DisplayInit(String),

    /// Rendering an HTTP response body failed
    #[error("Render error: {0}")]
    Render(String),

    /// Encoding an image or metrics payload failed
    #[error("Encode error: {0}")]
    Encode(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// GPIO operation failed (only available with gpio feature)
    #[cfg(feature = "gpio")]
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PitempError {
    /// Create a new sensor error
    pub fn sensor_error(msg: impl Into<String>) -> Self {
        Self::Sensor(msg.into())
    }

    /// Create a new fetch error
    pub fn fetch_error(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a new decode error
    pub fn decode_error(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new network error
    pub fn network_error(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new display error
    pub fn display_error(msg: impl Into<String>) -> Self {
        Self::Display(msg.into())
    }

    /// Create a new display initialization error
    pub fn display_init_error(msg: impl Into<String>) -> Self {
        Self::DisplayInit(msg.into())
    }

    /// Create a new render error
    pub fn render_error(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Create a new encode error
    pub fn encode_error(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new GPIO error
    #[cfg(feature = "gpio")]
    pub fn gpio_error(msg: impl Into<String>) -> Self {
        Self::Gpio(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
