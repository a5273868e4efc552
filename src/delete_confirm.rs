use thiserror::Error;

use crate::gateway::EntryRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeleteError {
    #[error("no delete confirmation is open")]
    NotOpen,
    #[error("human verification is required before deleting")]
    Unverified,
    #[error("a delete request is already running")]
    Busy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeleteState {
    #[default]
    Closed,
    Open {
        target: EntryRef,
        captcha: Option<String>,
    },
    Deleting {
        target: EntryRef,
        captcha: String,
    },
}

/// Confirmation modal for deleting a comment or reply.
///
/// A captcha token only lives as long as the open session it was solved in.
#[derive(Debug, Default)]
pub struct DeleteConfirmation {
    state: DeleteState,
}

impl DeleteConfirmation {
    pub fn state(&self) -> &DeleteState {
        &self.state
    }

    pub fn is_deleting(&self) -> bool {
        matches!(self.state, DeleteState::Deleting { .. })
    }

    pub fn open(&mut self, target: EntryRef) -> Result<(), DeleteError> {
        if self.is_deleting() {
            return Err(DeleteError::Busy);
        }
        self.state = DeleteState::Open {
            target,
            captcha: None,
        };
        Ok(())
    }

    pub fn verify(&mut self, token: impl Into<String>) -> Result<(), DeleteError> {
        match &mut self.state {
            DeleteState::Open { captcha, .. } => {
                *captcha = Some(token.into());
                Ok(())
            }
            DeleteState::Deleting { .. } => Err(DeleteError::Busy),
            DeleteState::Closed => Err(DeleteError::NotOpen),
        }
    }

    /// Moves to `Deleting` and hands out what the request needs.
    pub fn begin(&mut self) -> Result<(EntryRef, String), DeleteError> {
        match &self.state {
            DeleteState::Closed => Err(DeleteError::NotOpen),
            DeleteState::Deleting { .. } => Err(DeleteError::Busy),
            DeleteState::Open { captcha: None, .. } => Err(DeleteError::Unverified),
            DeleteState::Open {
                target,
                captcha: Some(captcha),
            } => {
                let (target, captcha) = (*target, captcha.clone());
                self.state = DeleteState::Deleting {
                    target,
                    captcha: captcha.clone(),
                };
                Ok((target, captcha))
            }
        }
    }

    /// Closes on success; on failure the modal stays open with its token so the user can retry.
    pub fn finish(&mut self, deleted: bool) {
        if !self.is_deleting() {
            return;
        }
        let DeleteState::Deleting { target, captcha } = std::mem::take(&mut self.state) else {
            return;
        };
        if !deleted {
            self.state = DeleteState::Open {
                target,
                captcha: Some(captcha),
            };
        }
    }

    pub fn close(&mut self) -> Result<(), DeleteError> {
        if self.is_deleting() {
            return Err(DeleteError::Busy);
        }
        self.state = DeleteState::Closed;
        Ok(())
    }
}
