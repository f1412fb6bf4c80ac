use crate::config::Settings;
use crate::device::DeviceInfo;

/// Platform permissions relevant to exporting, as reported by the platform layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_write: bool,
    pub can_upload: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            can_write: true,
            can_upload: true,
        }
    }
}

/// Everything that lives for one application run.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub app_name: String,
    pub settings: Settings,
    pub device: DeviceInfo,
    pub capabilities: Capabilities,
}

impl AppContext {
    pub fn new(settings: Settings, device: DeviceInfo) -> Self {
        Self {
            app_name: "UCM Research".to_string(),
            settings,
            device,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}
