use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    EmptyMatrix(String),
    BadThreshold(String),
    BadViewport(String),
    BadUrl(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::EmptyMatrix(e) => write!(f, "Capture matrix error: {}", e),
            ConfigError::BadThreshold(e) => write!(f, "Threshold out of range: {}", e),
            ConfigError::BadViewport(e) => write!(f, "Viewport error: {}", e),
            ConfigError::BadUrl(e) => write!(f, "URL error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum DiscoveryError {
    RequestFailed(String),
    BadIndex(String),
    SourceScanFailed(std::io::Error),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::RequestFailed(e) => write!(f, "Story index request failed: {}", e),
            DiscoveryError::BadIndex(e) => write!(f, "Story index unusable: {}", e),
            DiscoveryError::SourceScanFailed(e) => write!(f, "Source scan failed: {}", e),
        }
    }
}

impl std::error::Error for DiscoveryError {}

#[derive(Debug)]
pub enum CaptureError {
    LaunchFailed(String),
    PageFailed(String),
    NavigationTimeout(String),
    EvaluationFailed(String),
    ScreenshotFailed(String),
    RetriesExhausted(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::LaunchFailed(e) => write!(f, "Browser launch failed: {}", e),
            CaptureError::PageFailed(e) => write!(f, "Page operation failed: {}", e),
            CaptureError::NavigationTimeout(e) => write!(f, "Navigation timed out: {}", e),
            CaptureError::EvaluationFailed(e) => write!(f, "Script evaluation failed: {}", e),
            CaptureError::ScreenshotFailed(e) => write!(f, "Screenshot failed: {}", e),
            CaptureError::RetriesExhausted(e) => write!(f, "Capture retries exhausted: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

#[derive(Debug)]
pub enum StoreError {
    IoError(std::io::Error),
    IndexCorrupt(String),
    MissingArtifact(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::IoError(e) => write!(f, "Store IO error: {}", e),
            StoreError::IndexCorrupt(e) => write!(f, "Metadata index corrupt: {}", e),
            StoreError::MissingArtifact(e) => write!(f, "Artifact not found: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::IoError(err)
    }
}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    StoreError(StoreError),
    CaptureError(CaptureError),
    SetupFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::StoreError(e) => write!(f, "Store error: {}", e),
            ControllerError::CaptureError(e) => write!(f, "Capture error: {}", e),
            ControllerError::SetupFailed(e) => write!(f, "Setup failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<StoreError> for ControllerError {
    fn from(err: StoreError) -> Self {
        ControllerError::StoreError(err)
    }
}

impl From<CaptureError> for ControllerError {
    fn from(err: CaptureError) -> Self {
        ControllerError::CaptureError(err)
    }
}
