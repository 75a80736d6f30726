use std::fmt;

pub const UNKNOWN_UPTIME: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    pub ip: Option<String>,
    pub uptime: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRecord {
    pub name: String,
    pub namespace: String,
    pub ip: String,
    pub port: i32,
    pub uptime: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Version {
    Reported(String),
    Unavailable,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Reported(v) => f.write_str(v),
            Version::Unavailable => f.write_str("Version Unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionResult {
    pub endpoint: EndpointRecord,
    pub version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSegment {
    pub pod_name: String,
    pub namespace: String,
    pub text: String,
}
