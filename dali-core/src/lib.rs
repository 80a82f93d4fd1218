// Core library for dali, a synthetic payload HTTP server
// Turns one configured byte length per scope into an exact-length response body

pub mod assembler;
pub mod body;
pub mod chain;
pub mod device;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod logging;
pub mod pattern;
pub mod plan;
pub mod range;
pub mod scope;
pub mod server;
pub mod size_config;
pub mod timing;
pub mod transport;

// Re-export commonly used types
pub use assembler::ResponseAssembler;
pub use body::{BodyFailure, ChainBody, FailureHook, SendContext};
pub use chain::{BufferDescriptor, ResponseChain, Source, SourceKind};
pub use device::{DevZero, DeviceHandle, ZeroSource};
pub use error::*;
pub use handler::{PayloadHandler, PayloadRequest, RequestContext};
pub use lifecycle::{RequestLifecycle, RequestState};
pub use pattern::{PATTERN_BYTE, QUANTUM, StaticPatternBuffer};
pub use plan::{ParseStrategyError, PatternRounding, PayloadPlan, PayloadPlanner, Strategy};
pub use range::{ByteRange, RangeRequest};
pub use scope::{ResolvedScope, RouteTable, ScopeId, ScopeSettings, ScopeTree};
pub use server::{DaliServer, HyperTransport};
pub use size_config::SizeConfig;
pub use timing::{BodyDrainTimer, MonotonicClock, Timestamp, TimingReport, TokioClock};
pub use transport::{HeaderOutcome, ResponseHead, Transport, TransportError};
