mod error;
pub mod event;
pub mod guard;
pub mod response;

pub use error::Error;
pub use event::{CustomResourceEvent, ExecutionContext, RequestType};
pub use guard::{run_guarded, Completion, DEADLINE_MARGIN};
pub use response::{CfnResponder, ResponseStatus, ResponseTarget, StatusReporter};
