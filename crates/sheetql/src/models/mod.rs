pub mod query_envelope;
pub mod query_response;

pub use query_envelope::{
    QUERY_ENVELOPE_SCHEMA_VERSION, QueryEnvelope, QueryEnvelopeCommandFailure, QueryEnvelopeError,
    QueryEnvelopeMeta, QueryEnvelopeWarning,
};
pub use query_response::{ErrorKind, QueryFailure, QueryResponse, QuerySuccess, json_schema};
