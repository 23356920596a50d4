// Request execution: the driver loop and its collaborator seams
pub mod dispatcher;
pub mod driver;
pub mod request;

pub use dispatcher::{AttemptDispatcher, AttemptFailure, NoSkewAdjuster, SkewAdjuster};
pub use driver::{CallOutcome, RetryDriver};
pub use request::{RpcRequest, RpcResponse, INVOCATION_ID_HEADER, RETRY_INFO_HEADER};
