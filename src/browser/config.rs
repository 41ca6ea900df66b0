use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the browser instance shared by a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,

    /// Browser window size
    pub window_size: (u32, u32),

    /// Custom user agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Navigation timeout in seconds
    pub timeout_seconds: u64,

    /// Disable image loading for performance
    pub disable_images: bool,

    /// Additional Chrome flags
    pub chrome_flags: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1920, 1080),
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            timeout_seconds: 60,
            disable_images: false,
            chrome_flags: vec![
                "--disable-blink-features=AutomationControlled".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--no-sandbox".to_string(),
            ],
        }
    }
}

impl BrowserConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Every Chrome argument this configuration asks for, flags first
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = self.chrome_flags.clone();
        if self.disable_images {
            args.push("--blink-settings=imagesEnabled=false".to_string());
        }
        if let Some(ua) = &self.user_agent {
            args.push(format!("--user-agent={}", ua));
        }
        args
    }
}
