use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Notifier panicked: {0}")]
    NotifierPanicked(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<AppError> for ServiceError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotificationError(msg) => ServiceError::Notification(msg),
            other => ServiceError::Internal(anyhow::anyhow!(other.to_string())),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Notification(msg) => AppError::NotificationError(msg),
            ServiceError::NotifierPanicked(msg) => {
                AppError::InternalError(anyhow::anyhow!("Notifier panicked: {}", msg))
            }
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
