/// Errors raised while decoding extended JSON.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EjsonError {
    /// A recognized wrapper (`$oid`, `$date`, `$numberLong`, ...) had an invalid body.
    #[error("Malformed extended JSON: {0}")]
    Malformed(String),
    #[error("Integer {0} does not fit in a signed 64-bit value")]
    IntegerOutOfRange(String),
}

