//! Error types for the boundary layers (codecs, device I/O). The pure core
//! state machines never throw across their public boundary -- failures there
//! are observable via flags (`error()`, `active()`), per the error policy
//! table in the design doc.

#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("malformed {0} header")]
    ParseFailure(&'static str),

    #[error("tun device error: {0}")]
    Device(#[from] std::io::Error),
}
