/*
 * Kernel Invariant Macros
 *
 * A broken scheduling invariant means the process table can no longer be
 * trusted, so these macros log the reason through the `log` facade and
 * then panic. They are the only way the scheduler reports fatal errors.
 */

/// Log an error and panic
///
/// Used for conditions that can never be recovered from: an unknown policy
/// id, the root process exiting, a lock hand-off at the wrong depth.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {
        match ::core::format_args!($($arg)*) {
            message => {
                $crate::__log::error!("{}", message);
                ::core::panic!("{}", message)
            }
        }
    };
}

/// Assert a kernel invariant, `fatal!` if it does not hold
#[macro_export]
macro_rules! invariant {
    ($cond:expr, $($arg:tt)*) => ({
        if !$cond {
            $crate::fatal!($($arg)*);
        }
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_invariant_holds() {
        crate::invariant!(1 + 1 == 2, "arithmetic is broken");
    }

    #[test]
    #[should_panic(expected = "evaluated 1 time")]
    fn test_fatal_formats_its_arguments_once() {
        let mut count = 0;
        crate::fatal!("evaluated {} time", {
            count += 1;
            count
        });
    }

    #[test]
    #[should_panic(expected = "panic: 7")]
    fn test_invariant_violation_panics() {
        let value = 7;
        crate::invariant!(value < 5, "panic: {}", value);
    }
}
