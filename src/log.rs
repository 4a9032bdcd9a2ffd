//! Utilities for logging messages from the library.

use once_cell::sync::Lazy;

#[doc(hidden)]
#[macro_export]
macro_rules! rsvg_log {
    (
        $session:expr,
        $($arg:tt)+
    ) => {
        if $session.log_enabled() {
            println!("{}", format_args!($($arg)+));
        }
    };
}

/// Returns whether the `RSVG_LOG` environment variable is set.
///
/// The environment is only looked at once per process.
pub fn log_enabled() -> bool {
    static ENABLED: Lazy<bool> = Lazy::new(|| ::std::env::var_os("RSVG_LOG").is_some());

    *ENABLED
}
