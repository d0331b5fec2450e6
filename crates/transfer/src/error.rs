use thiserror::Error;

/// Errors that can terminate a transfer outright.
///
/// Per-datagram problems (short frames, address/transfer-id mismatches,
/// out-of-range chunk ids) are not represented here: the spec treats those
/// as "drop the datagram and keep going", so the engines handle them with a
/// logged `continue` rather than by returning an `Err` that would end the
/// loop.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The sender could not open its input file.
    #[error("could not open input file: {0}")]
    InputOpenFailed(#[source] std::io::Error),
    /// A read of the input file failed mid-transfer. Fatal per the spec.
    #[error("input file read failed: {0}")]
    InputReadFailed(#[source] std::io::Error),
    /// A socket operation failed for a reason other than would-block.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}
