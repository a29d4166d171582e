//! Service regions and transport scheme selection.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Region tag used in the derived endpoint host (`<bucket>-<appid>.<region>.myqcloud.com`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Region(Cow<'static, str>);

impl Region {
    /// East China (Shanghai)
    pub const SHANGHAI: Region = Region(Cow::Borrowed("cn-east"));
    /// South China (Guangzhou)
    pub const GUANGZHOU: Region = Region(Cow::Borrowed("cn-south"));
    /// North China (Tianjin)
    pub const TIANJIN: Region = Region(Cow::Borrowed("cn-north"));
    /// Singapore
    pub const SINGAPORE: Region = Region(Cow::Borrowed("sg"));

    /// Create a region from an arbitrary tag
    pub fn new(tag: impl Into<String>) -> Self {
        Region(Cow::Owned(tag.into()))
    }

    /// The region tag as it appears in hostnames
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::GUANGZHOU
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Region {
    fn from(tag: String) -> Self {
        Region::new(tag)
    }
}

impl From<&str> for Region {
    fn from(tag: &str) -> Self {
        Region::new(tag)
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.0.into_owned()
    }
}

/// URL scheme for the given transport security flag
pub fn protocol(secure: bool) -> &'static str {
    if secure {
        "https"
    } else {
        "http"
    }
}
