use teloxide::{net::Download, prelude::*};

use askbot_core::{errors::Error, Result};

/// Fetch a photo's bytes by file id. Nothing touches disk.
pub(crate) async fn download_photo(bot: &Bot, file_id: String) -> Result<Vec<u8>> {
    let file = bot
        .get_file(file_id)
        .await
        .map_err(|e| Error::Upstream(format!("telegram get_file error: {e}")))?;

    let mut buf: Vec<u8> = Vec::new();
    bot.download_file(&file.path, &mut buf)
        .await
        .map_err(|e| Error::Upstream(format!("telegram download error: {e}")))?;

    tracing::debug!(bytes = buf.len(), "photo downloaded");
    Ok(buf)
}
