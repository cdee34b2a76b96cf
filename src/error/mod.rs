//! Error types and utilities.
//!
//! The [`BoxError`] type is a type-erased error, used wherever it matters
//! more _that_ something failed than what failed exactly. Use
//! [`ErrorContext`] to attach context to such errors and [`ErrorExt`]
//! to walk or render their chain of causes.
//!
//! The typed errors of the gateway live next to the code producing them
//! and are re-exported here:
//!
//! - [`ConfigError`]: invalid startup configuration, fatal;
//! - [`ConstructionError`]: outbound request could not be built, served as a `500`;
//! - [`DispatchError`]: tunnel or upstream failure, served as a `502`;
//! - [`StreamRelayError`]: relay of the response body broke off, logged only.

use std::fmt::{self, Debug, Display};

mod chain;
pub use chain::DisplayChain;

pub use crate::config::ConfigError;
pub use crate::http::{ConstructionError, DispatchError, StreamRelayError};

/// Alias for a type-erased error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[repr(transparent)]
/// A type-erased error, produced by [`ErrorContext`].
pub struct OpaqueError(BoxError);

impl OpaqueError {
    /// create an [`OpaqueError`] from an std error
    pub fn from_std(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(error))
    }

    /// create an [`OpaqueError`] from a display object
    pub fn from_display(msg: impl Display + Debug + Send + Sync + 'static) -> Self {
        Self::from_std(MessageError(msg))
    }

    /// create an [`OpaqueError`] from a boxed error
    pub fn from_boxed(inner: BoxError) -> Self {
        Self(inner)
    }

    /// Wrap this error in a context.
    #[must_use]
    pub fn context<M>(self, context: M) -> Self
    where
        M: Display + Send + Sync + 'static,
    {
        Self::from_std(ContextError {
            context,
            error: self.0,
        })
    }
}

impl Debug for OpaqueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for OpaqueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for OpaqueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

#[repr(transparent)]
struct MessageError<M>(M);

impl<M: Debug> Debug for MessageError<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl<M: Display> Display for MessageError<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<M> std::error::Error for MessageError<M> where M: Display + Debug {}

/// Context attached to an error: displays only the context,
/// the wrapped error is its source.
struct ContextError<C> {
    context: C,
    error: BoxError,
}

impl<C: Display> Debug for ContextError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextError")
            .field("context", &format_args!("{}", self.context))
            .field("error", &self.error)
            .finish()
    }
}

impl<C: Display> Display for ContextError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.context, f)
    }
}

impl<C: Display> std::error::Error for ContextError<C> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}

/// Extends the `Result` and `Option` types with methods for adding context to errors.
///
/// # Examples
///
/// ```
/// use socks_gateway::error::{ErrorContext, ErrorExt};
///
/// let result = "hello".parse::<i32>().context("parse integer");
/// assert_eq!(
///     "parse integer: invalid digit found in string",
///     result.unwrap_err().display_chain().to_string(),
/// );
/// ```
pub trait ErrorContext: private::SealedErrorContext {
    /// The resulting context type after adding context to the contained error.
    type Context;

    /// Add a static context to the contained error.
    fn context<M>(self, context: M) -> Self::Context
    where
        M: Display + Send + Sync + 'static;

    /// Lazily add a context to the contained error, if it exists.
    fn with_context<C, F>(self, context: F) -> Self::Context
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    type Context = Result<T, OpaqueError>;

    fn context<M>(self, context: M) -> Self::Context
    where
        M: Display + Send + Sync + 'static,
    {
        self.map_err(|error| OpaqueError::from_std(error).context(context))
    }

    fn with_context<C, F>(self, context: F) -> Self::Context
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|error| OpaqueError::from_std(error).context(context()))
    }
}

impl<T> ErrorContext for Option<T> {
    type Context = Result<T, OpaqueError>;

    fn context<M>(self, context: M) -> Self::Context
    where
        M: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| OpaqueError::from_display("Option is None").context(context))
    }

    fn with_context<C, F>(self, context: F) -> Self::Context
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| OpaqueError::from_display("Option is None").context(context()))
    }
}

/// Extends errors with methods to walk and render their chain of causes.
pub trait ErrorExt {
    /// Iterate over the chain of errors, starting with this error.
    fn chain(&self) -> impl Iterator<Item = &(dyn std::error::Error + 'static)>;

    /// Render the full chain of errors as a single line, `: ` separated.
    fn display_chain(&self) -> DisplayChain<'_>;
}

impl<E> ErrorExt for E
where
    E: std::error::Error + 'static,
{
    fn chain(&self) -> impl Iterator<Item = &(dyn std::error::Error + 'static)> {
        chain::Chain::new(self)
    }

    fn display_chain(&self) -> DisplayChain<'_> {
        DisplayChain::new(self)
    }
}

impl ErrorExt for dyn std::error::Error + Send + Sync {
    fn chain(&self) -> impl Iterator<Item = &(dyn std::error::Error + 'static)> {
        chain::Chain::new(self)
    }

    fn display_chain(&self) -> DisplayChain<'_> {
        DisplayChain::new(self)
    }
}

mod private {
    pub trait SealedErrorContext {}

    impl<T, E: std::error::Error + Send + Sync + 'static> SealedErrorContext for Result<T, E> {}
    impl<T> SealedErrorContext for Option<T> {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct CustomError;

    impl Display for CustomError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "custom error")
        }
    }

    impl std::error::Error for CustomError {}

    #[test]
    fn result_context_chain() {
        let error = Err::<(), _>(CustomError).context("context").unwrap_err();
        assert_eq!(error.to_string(), "context");
        assert_eq!(error.display_chain().to_string(), "context: custom error");
    }

    #[test]
    fn option_context_chain() {
        let error = None::<()>.context("missing value").unwrap_err();
        assert_eq!(
            error.display_chain().to_string(),
            "missing value: Option is None"
        );
    }

    #[test]
    fn nested_context_chain_len() {
        let error = OpaqueError::from_std(CustomError)
            .context("a")
            .context("b")
            .context("c");
        assert_eq!(4, error.chain().count());
        assert_eq!(error.display_chain().to_string(), "c: b: a: custom error");
    }

    #[test]
    fn box_error_display_chain() {
        let error: BoxError = OpaqueError::from_std(CustomError).context("boxed").into();
        assert_eq!(error.display_chain().to_string(), "boxed: custom error");
    }
}
