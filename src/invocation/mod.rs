//! Invocation data model: metadata, payload and error reports.

mod metadata;
mod report;

pub use metadata::{
    Invocation, InvocationMetadata, CLIENT_CONTEXT_HEADER, COGNITO_IDENTITY_HEADER,
    DEADLINE_HEADER, FUNCTION_ARN_HEADER, REQUEST_ID_HEADER, TRACE_ID_HEADER,
};
pub use report::ErrorReport;
