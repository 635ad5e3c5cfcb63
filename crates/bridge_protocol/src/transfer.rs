use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("resource was already transferred to another context")]
    Detached,
}

/// Slot for a resource that may be handed to another context exactly once.
///
/// `transfer` moves the value out and leaves the slot detached; every later access
/// through the slot reports `TransferError::Detached` instead of touching the resource.
#[derive(Debug)]
pub struct Transferable<T> {
    slot: Option<T>,
}

impl<T> Transferable<T> {
    pub fn new(value: T) -> Self {
        Self { slot: Some(value) }
    }

    pub fn detached() -> Self {
        Self { slot: None }
    }

    pub fn is_detached(&self) -> bool {
        self.slot.is_none()
    }

    pub fn get(&self) -> Result<&T, TransferError> {
        self.slot.as_ref().ok_or(TransferError::Detached)
    }

    pub fn get_mut(&mut self) -> Result<&mut T, TransferError> {
        self.slot.as_mut().ok_or(TransferError::Detached)
    }

    pub fn transfer(&mut self) -> Result<T, TransferError> {
        self.slot.take().ok_or(TransferError::Detached)
    }
}

impl<T> Default for Transferable<T> {
    fn default() -> Self {
        Self::detached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_transfer_reports_detached() {
        let mut slot = Transferable::new(vec![1u8, 2, 3]);
        assert_eq!(slot.transfer(), Ok(vec![1, 2, 3]));
        assert_eq!(slot.transfer(), Err(TransferError::Detached));
        assert_eq!(slot.get().err(), Some(TransferError::Detached));
        assert!(slot.is_detached());
    }

    #[test]
    fn access_before_transfer_is_allowed() {
        let mut slot = Transferable::new(5u32);
        *slot.get_mut().expect("attached") += 1;
        assert_eq!(slot.get(), Ok(&6));
    }
}
