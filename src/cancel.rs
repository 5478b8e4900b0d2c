use crate::error::{Error, Result};

/// Cooperative cancellation shared between a caller and running operations.
///
/// Operations check the token before every HTTP attempt and every listing
/// page. Cancelling a token also cancels every token derived from it with
/// [`CancellationToken::child_token`], but not its parent.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(tokio_util::sync::CancellationToken);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Token that is cancelled together with `self`, or on its own.
    pub fn child_token(&self) -> Self {
        Self(self.0.child_token())
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl From<tokio_util::sync::CancellationToken> for CancellationToken {
    fn from(token: tokio_util::sync::CancellationToken) -> Self {
        Self(token)
    }
}
