// Dali - a synthetic payload HTTP server for load testing
//
// Each path scope carries a byte length and a strategy; requests under it get
// a body of exactly that length without the server building it in memory.

// Re-export core functionality
pub use dali_core::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use dali_config;

pub use async_trait::async_trait;
pub use tokio;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        DaliServer, Error, PatternRounding, PayloadHandler, PayloadPlanner, PayloadRequest,
        RequestState, ResponseAssembler, Result, RouteTable, ScopeId, ScopeSettings, ScopeTree,
        SizeConfig, Strategy, Transport,
    };

    pub use crate::logging::{LogConfig, LogFormat, LogLevel};

    #[cfg(feature = "config")]
    pub use dali_config::{ByteSize, ConfigError, DaliConfig};

    pub use crate::async_trait;
}
