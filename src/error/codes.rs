/// Error code registry for streamagg
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Transfer errors (reading the source object)
/// - 3000-3999: Persistence errors (writing summaries to the sink)
/// - 4000-4999: Row errors (recovered locally, never fatal)
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_TOML: u16 = 1002;
    pub const CONFIG_MISSING_REQUIRED: u16 = 1003;
    pub const CONFIG_INVALID_VALUE: u16 = 1004;
    pub const CONFIG_BACKEND_DISABLED: u16 = 1005;

    // Transfer errors (2000-2999)
    pub const TRANSFER_GENERIC: u16 = 2000;
    pub const TRANSFER_OBJECT_NOT_FOUND: u16 = 2001;
    pub const TRANSFER_INVALID_RANGE: u16 = 2002;
    pub const TRANSFER_SHORT_READ: u16 = 2003;
    pub const TRANSFER_IO_ERROR: u16 = 2004;
    pub const TRANSFER_UNAVAILABLE: u16 = 2005;

    // Persistence errors (3000-3999)
    pub const PERSIST_GENERIC: u16 = 3000;
    pub const PERSIST_BATCH_TOO_LARGE: u16 = 3001;
    pub const PERSIST_THROTTLED: u16 = 3002;
    pub const PERSIST_IO_ERROR: u16 = 3003;
    pub const PERSIST_SERIALIZATION_ERROR: u16 = 3004;
    pub const PERSIST_UNAVAILABLE: u16 = 3005;

    // Row errors (4000-4999)
    pub const ROW_COLUMN_COUNT: u16 = 4001;
    pub const ROW_INVALID_MEASURE: u16 = 4002;
    pub const ROW_NEGATIVE_MEASURE: u16 = 4003;
    pub const ROW_INVALID_ENCODING: u16 = 4004;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        // Configuration errors
        1000 => "Generic configuration error",
        1001 => "Configuration file not found",
        1002 => "Invalid TOML syntax in configuration",
        1003 => "Required configuration field is missing",
        1004 => "Invalid value in configuration",
        1005 => "Requested backend is not compiled in",

        // Transfer errors
        2000 => "Generic transfer error",
        2001 => "Source object not found",
        2002 => "Invalid content range in response",
        2003 => "Response body shorter than its content range",
        2004 => "Transfer I/O error",
        2005 => "Blob store unavailable",

        // Persistence errors
        3000 => "Generic persistence error",
        3001 => "Batch exceeds the sink's per-call limit",
        3002 => "Sink kept throttling after all retries",
        3003 => "Persistence I/O error",
        3004 => "Failed to serialize items for the sink",
        3005 => "Sink unavailable",

        // Row errors
        4001 => "Row does not have exactly four columns",
        4002 => "Measure column is not a number",
        4003 => "Measure column is negative",
        4004 => "Row is not valid UTF-8",

        _ => "Unknown error code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_registered_code_has_description() {
        let codes = [
            ErrorCode::CONFIG_GENERIC,
            ErrorCode::CONFIG_NOT_FOUND,
            ErrorCode::CONFIG_INVALID_TOML,
            ErrorCode::CONFIG_MISSING_REQUIRED,
            ErrorCode::CONFIG_INVALID_VALUE,
            ErrorCode::CONFIG_BACKEND_DISABLED,
            ErrorCode::TRANSFER_GENERIC,
            ErrorCode::TRANSFER_OBJECT_NOT_FOUND,
            ErrorCode::TRANSFER_INVALID_RANGE,
            ErrorCode::TRANSFER_SHORT_READ,
            ErrorCode::TRANSFER_IO_ERROR,
            ErrorCode::TRANSFER_UNAVAILABLE,
            ErrorCode::PERSIST_GENERIC,
            ErrorCode::PERSIST_BATCH_TOO_LARGE,
            ErrorCode::PERSIST_THROTTLED,
            ErrorCode::PERSIST_IO_ERROR,
            ErrorCode::PERSIST_SERIALIZATION_ERROR,
            ErrorCode::PERSIST_UNAVAILABLE,
            ErrorCode::ROW_COLUMN_COUNT,
            ErrorCode::ROW_INVALID_MEASURE,
            ErrorCode::ROW_NEGATIVE_MEASURE,
            ErrorCode::ROW_INVALID_ENCODING,
        ];

        for code in codes {
            assert_ne!(describe_error_code(code), "Unknown error code", "code {code}");
        }
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(describe_error_code(42), "Unknown error code");
    }
}
