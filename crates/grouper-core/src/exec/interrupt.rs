//! Cooperative cancellation boundary.

use crate::error::{ErrorOrigin, InternalError};
use std::sync::atomic::{AtomicBool, Ordering};

///
/// Interrupt
///
/// Polled between rows and at every group boundary.
///

pub trait Interrupt {
    fn is_interrupted(&self) -> bool;
}

///
/// NeverInterrupt
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NeverInterrupt;

impl Interrupt for NeverInterrupt {
    fn is_interrupted(&self) -> bool {
        false
    }
}

impl Interrupt for AtomicBool {
    fn is_interrupted(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

pub(crate) fn poll(interrupt: &dyn Interrupt, origin: ErrorOrigin) -> Result<(), InternalError> {
    if interrupt.is_interrupted() {
        Err(InternalError::interrupted(origin))
    } else {
        Ok(())
    }
}
