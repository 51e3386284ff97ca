mod reducible_errors;
mod storage_errors;
mod typed_errors;
mod ui_errors;

pub use reducible_errors::*;
pub use storage_errors::*;
pub use typed_errors::*;
pub use ui_errors::*;

// Walks an error chain looking for a concrete error type.
pub trait AsError {
    fn as_error<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E>;

    fn is_error<E: std::error::Error + PartialEq + Send + Sync + 'static>(&self, err: &E) -> bool {
        if let Some(e) = self.as_error::<E>() {
            e == err
        } else {
            false
        }
    }
}

impl AsError for anyhow::Error {
    fn as_error<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.chain().find_map(|cause| cause.downcast_ref::<E>())
    }
}
