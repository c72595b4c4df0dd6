use crate::error::Result;
use crate::git::{RepoRef, SourceControl};
use tracing::{error, info};

/// Puts the working tree back on the reference it started at.
///
/// Call [`CheckoutGuard::restore`] on the normal path to see restore errors;
/// if the guard is dropped first (early return, panic) it restores on drop
/// and can only log a failure.
pub struct CheckoutGuard<'a> {
    repo: &'a dyn SourceControl,
    original: RepoRef,
    armed: bool,
}

impl<'a> CheckoutGuard<'a> {
    pub fn capture(repo: &'a dyn SourceControl) -> Result<Self> {
        let original = repo.current_ref()?;
        info!(start = %original, "recorded starting reference");
        Ok(CheckoutGuard { repo, original, armed: true })
    }

    #[cfg(test)]
    pub fn original(&self) -> &RepoRef {
        &self.original
    }

    pub fn restore(mut self) -> Result<()> {
        self.armed = false;
        self.checkout_original()
    }

    fn checkout_original(&self) -> Result<()> {
        self.repo.checkout(self.original.checkout_target())?;
        info!(restored = %self.original, "restored starting reference");
        Ok(())
    }
}

impl Drop for CheckoutGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.checkout_original() {
            error!(error = %e, target = %self.original, "could not restore starting reference");
        }
    }
}
