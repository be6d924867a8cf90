//! Exit code constants for the mapq CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, bad key, bad config)
//! - 2: Serialization failure (payload could not be encoded/decoded)
//! - 3: Backend unavailable (disk I/O failure, network store down)
//! - 4: Lock acquisition timed out
//! - 5: Map is invalid (destroyed or corrupted)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid key, or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// Serialization failure: a payload could not be encoded or decoded.
pub const SERIALIZATION_FAILURE: i32 = 2;

/// Storage medium unreachable: disk I/O failure or network store down.
pub const BACKEND_UNAVAILABLE: i32 = 3;

/// Lock acquisition failure: the map lock was not acquired within its timeout.
pub const LOCK_FAILURE: i32 = 4;

/// The map was destroyed or failed its integrity check.
pub const INVALID_MAP: i32 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            USER_ERROR,
            SERIALIZATION_FAILURE,
            BACKEND_UNAVAILABLE,
            LOCK_FAILURE,
            INVALID_MAP,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn success_is_zero() {
        assert_eq!(SUCCESS, 0);
    }
}
