use std::time::Duration;

use nvrpc_codec::{ExtTypes, DEFAULT_MAX_FRAME};

/// Environment toggle selecting the line-JSON protocol.
pub const ENV_LINE_JSON: &str = "VIM_NODE_RPC";
/// Environment toggle selecting the coc bridge function names.
pub const ENV_COC: &str = "COC_NVIM";

/// Wire protocol spoken with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolMode {
    /// msgpack-RPC with extension-typed handles.
    #[default]
    Native,
    /// Newline-delimited JSON through a call trampoline.
    LineJson,
}

/// Which family of trampoline functions the host side provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeFlavor {
    Coc,
    #[default]
    Nvim,
}

impl BridgeFlavor {
    pub fn call_function(self) -> &'static str {
        match self {
            BridgeFlavor::Coc => "coc#api#call",
            BridgeFlavor::Nvim => "nvim#api#call",
        }
    }

    pub fn notify_function(self) -> &'static str {
        match self {
            BridgeFlavor::Coc => "coc#api#notify",
            BridgeFlavor::Nvim => "nvim#api#notify",
        }
    }
}

/// Transport selection, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub protocol_mode: ProtocolMode,
    /// Host function that executes a request and replies by id (line-JSON).
    pub bridge_function_name: String,
    /// Host function that executes a notification (line-JSON).
    pub bridge_notify_name: String,
    /// Largest frame accepted or produced, in bytes.
    pub max_frame: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::native()
    }
}

impl TransportConfig {
    pub fn native() -> Self {
        Self::with_mode(ProtocolMode::Native, BridgeFlavor::default())
    }

    pub fn line_json(flavor: BridgeFlavor) -> Self {
        Self::with_mode(ProtocolMode::LineJson, flavor)
    }

    fn with_mode(protocol_mode: ProtocolMode, flavor: BridgeFlavor) -> Self {
        Self {
            protocol_mode,
            bridge_function_name: flavor.call_function().to_string(),
            bridge_notify_name: flavor.notify_function().to_string(),
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    /// Read `VIM_NODE_RPC` and `COC_NVIM`.
    ///
    /// Only bootstrap code should call this; libraries take a config.
    pub fn from_env() -> Self {
        let line_json = std::env::var(ENV_LINE_JSON).ok();
        let coc = std::env::var(ENV_COC).ok();
        Self::from_toggles(line_json.as_deref(), coc.as_deref())
    }

    /// Resolve from raw toggle values; `"1"` enables a toggle.
    pub fn from_toggles(line_json: Option<&str>, coc: Option<&str>) -> Self {
        let flavor = if coc == Some("1") {
            BridgeFlavor::Coc
        } else {
            BridgeFlavor::Nvim
        };
        if line_json == Some("1") {
            Self::line_json(flavor)
        } else {
            Self::with_mode(ProtocolMode::Native, flavor)
        }
    }
}

/// Everything a [`Client`](crate::Client) needs at attach time.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub transport: TransportConfig,
    /// Extension tags for buffer/window/tabpage handles.
    pub ext_types: ExtTypes,
    /// A pause level open longer than this is reported as stale.
    pub stale_pause_after: Duration,
    /// Responses slower than this are logged.
    pub slow_request_threshold: Duration,
    /// Deadline for request replies. `None` waits until detach.
    pub request_timeout: Option<Duration>,
    /// Host function receiving async bridge requests.
    pub async_request_function: String,
    /// Host function receiving replies to host-originated async requests.
    pub async_response_function: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            ext_types: ExtTypes::default(),
            stale_pause_after: Duration::from_secs(1),
            slow_request_threshold: Duration::from_secs(1),
            request_timeout: None,
            async_request_function: "coc#rpc#async_request".to_string(),
            async_response_function: "coc#rpc#async_response".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_transport(transport: TransportConfig) -> Self {
        Self {
            transport,
            ..Self::default()
        }
    }
}
