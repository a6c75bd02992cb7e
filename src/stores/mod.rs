pub mod status;
pub mod subscribers;

pub use status::StatusStore;
pub use subscribers::SubscriberStore;

use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

use crate::utils::error::{AppError, Result};

/// Replace `path` with the JSON form of `value` in one rename, so readers see
/// either the old file or the new one and never a partial write.
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::persistence(parent, e))?;
    }

    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    if let Err(e) = tokio::fs::write(&tmp, &json).await {
        return Err(AppError::persistence(&tmp, e));
    }

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(AppError::persistence(path, e));
    }

    Ok(())
}
