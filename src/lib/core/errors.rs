use anyhow::Error;
use std::io;

use super::error::GroupError;

/// Returns `true` if the error originated from a broken pipe.
///
/// Write failures surface either as a bare [`io::Error`] or wrapped in
/// [`GroupError::Io`] when they come out of the report emitter.
#[inline]
pub fn is_broken_pipe(err: &Error) -> bool {
    let root = err.root_cause();
    let io_err = root.downcast_ref::<io::Error>().or_else(|| {
        match root.downcast_ref::<GroupError>() {
            Some(GroupError::Io(inner)) => Some(inner),
            _ => None,
        }
    });
    io_err
        .map(|io_err| io_err.kind() == io::ErrorKind::BrokenPipe)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_wrapped_broken_pipe() {
        let err = Error::from(GroupError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "closed")));
        assert!(is_broken_pipe(&err));
    }

    #[test]
    fn ignores_other_errors() {
        let err = Error::from(GroupError::NoReferences);
        assert!(!is_broken_pipe(&err));
    }
}
