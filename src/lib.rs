pub mod dispatcher;
pub mod error;
pub mod http;
pub mod ids;
pub mod mime;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod transport;
pub mod uri;

pub use crate::http::{Request, Response};
pub use dispatcher::Dispatch;
pub use error::{Error, Result};
pub use router::{HandlerEntry, HandlerId, Registry, RouteLookup};
pub use server::{close, open, Server};
pub use transport::HttpTransport;
#[cfg(feature = "tls")]
pub use transport::TlsConfig;
