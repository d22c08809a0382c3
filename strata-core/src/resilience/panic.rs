//! Panic logging hook
//!
//! Routes every panic through `tracing` with its location and thread name,
//! then delegates to the previous hook. The process is not terminated: a
//! panicking worker thread unwinds and the pool replaces it.
//!
//! ```no_run
//! strata_core::resilience::install_panic_handler();
//! ```

use std::panic;
use tracing::error;

/// Install the logging panic hook. Safe to call more than once.
pub fn install_panic_handler() {
    let previous = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("<unnamed>");
        let location = info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "<unknown location>".to_string());

        error!(
            thread = thread_name,
            location = %location,
            message = %payload_message(info.payload()),
            "panic"
        );

        previous(info);
    }));

    tracing::debug!("Panic handler installed");
}

/// Best-effort text of a panic payload
pub fn payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<no message>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(payload_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(payload_message(payload.as_ref()), "bang");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(payload_message(payload.as_ref()), "<no message>");
    }

    #[test]
    fn test_hook_does_not_exit() {
        install_panic_handler();
        install_panic_handler();

        let joined = std::thread::Builder::new()
            .name("panicky".into())
            .spawn(|| panic!("logged, not fatal"))
            .unwrap()
            .join();

        let err = joined.unwrap_err();
        assert_eq!(payload_message(err.as_ref()), "logged, not fatal");
    }
}
