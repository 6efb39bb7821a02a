//! Network I/O: the transport seam, rate limiting, cancellation, and the
//! session layer that ties them together.

pub mod backend;
mod cancel;
mod limit;
mod session;

pub use backend::{
    BackendError, BackendResponse, HttpBackend, MockBackend, MockResponse, ReqwestBackend,
    ResponseBody,
};
pub use cancel::CancelToken;
pub use session::{Endpoint, Session, SessionConfig};
