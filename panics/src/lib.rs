use core::any::Any;
use std::backtrace::Backtrace;

use anyhow::Error;
use tracing::error;

/// Logs a caught panic along with the stack of the thread that caught it.
pub fn log(payload: Box<dyn Any + Send + 'static>) {
    let thread = std::thread::current();
    // Use the same default as the standard library and various third-party crates.
    let name = thread.name().unwrap_or("<unnamed>");
    let error = payload_into_error(payload);
    let backtrace = Backtrace::force_capture();

    error!("thread {name} panicked: {error}\n{backtrace}");
}

#[must_use]
pub fn payload_into_error(payload: Box<dyn Any + Send + 'static>) -> Error {
    let payload = match payload.downcast::<String>() {
        Ok(string) => return Error::msg(*string),
        Err(other) => other,
    };

    if let Ok(string) = payload.downcast::<&str>() {
        return Error::msg(*string);
    }

    Error::msg("panic with payload of unknown type")
}

#[cfg(test)]
mod tests {
    use core::panic::AssertUnwindSafe;

    use super::*;

    #[test]
    fn payload_into_error_keeps_formatted_message() {
        let payload = std::panic::catch_unwind(AssertUnwindSafe(|| panic!("header {}", 7)))
            .expect_err("closure should panic");

        assert_eq!(payload_into_error(payload).to_string(), "header 7");
    }

    #[test]
    fn payload_into_error_keeps_static_message() {
        let payload = std::panic::catch_unwind(|| panic!("static message"))
            .expect_err("closure should panic");

        assert_eq!(payload_into_error(payload).to_string(), "static message");
    }

    #[test]
    fn payload_into_error_handles_unknown_payloads() {
        let payload = Box::new(42_u8);

        assert_eq!(
            payload_into_error(payload).to_string(),
            "panic with payload of unknown type",
        );
    }
}
