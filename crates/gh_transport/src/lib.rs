pub mod backoff;
pub mod error;
pub mod governor;
pub mod metrics;
pub mod model;
pub mod transport;

pub use error::TransportFailure;
pub use governor::{Decision, Governor, RetryPolicy};
pub use model::{ApiRequest, ApiResponse};
pub use transport::{GithubTransport, HttpExec, ReqwestExecutor, Transport};
