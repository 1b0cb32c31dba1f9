//! Pointer passing through the process environment
//!
//! A shared library loaded at runtime gets its own copy of every Rust
//! static, so host and module cannot meet through a global. The process
//! environment block is shared, which makes it the one channel that works
//! before any symbol of the module has run: the host serializes a pointer
//! as a hex string into an agreed variable, the module parses it back.
//!
//! Nothing here dereferences the pointer. Whoever calls [`retrieve`] is
//! responsible for knowing the pointee is still alive.

use crate::error::{PluginError, Result};

/// Serialize `ptr` into the environment variable `var`.
pub fn publish<T>(var: &str, ptr: *const T) {
    std::env::set_var(var, format!("{:x}", ptr as usize));
}

/// Parse the pointer previously published under `var`.
pub fn retrieve<T>(var: &str) -> Result<*const T> {
    let raw = std::env::var(var).map_err(|_| PluginError::missing_handshake(var))?;
    let addr =
        usize::from_str_radix(&raw, 16).map_err(|_| PluginError::bad_pointer(var, &raw))?;
    if addr == 0 {
        return Err(PluginError::bad_pointer(var, &raw));
    }
    Ok(addr as *const T)
}

/// Remove `var` so later retrievals fail instead of yielding a stale
/// pointer.
pub fn clear(var: &str) {
    std::env::remove_var(var);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let value = 7_u64;
        let ptr: *const u64 = &value;

        publish("NGT_TEST_PTR_ROUND_TRIP", ptr);
        let back = retrieve::<u64>("NGT_TEST_PTR_ROUND_TRIP").unwrap();
        assert_eq!(back, ptr);

        clear("NGT_TEST_PTR_ROUND_TRIP");
        assert!(matches!(
            retrieve::<u64>("NGT_TEST_PTR_ROUND_TRIP"),
            Err(PluginError::MissingHandshake(_))
        ));
    }

    #[test]
    fn test_garbage_value_rejected() {
        std::env::set_var("NGT_TEST_PTR_GARBAGE", "not hex");
        assert!(matches!(
            retrieve::<u64>("NGT_TEST_PTR_GARBAGE"),
            Err(PluginError::BadPointer { .. })
        ));

        std::env::set_var("NGT_TEST_PTR_GARBAGE", "0");
        assert!(retrieve::<u64>("NGT_TEST_PTR_GARBAGE").is_err());
        std::env::remove_var("NGT_TEST_PTR_GARBAGE");
    }
}
