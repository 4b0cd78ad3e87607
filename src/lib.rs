pub mod cache;
pub mod decode;
pub mod error;
pub mod formulas;
pub mod models;

pub use cache::{CacheStore, DiskStore, MemoryStore, SettingsCache};
pub use decode::{decode_settings, decode_slice, decode_str};
pub use error::{ExperienceError, Result};
pub use models::{
    AdSettings, AdType, CreativeExperienceSettings, EndCardDurations, EndCardType, ExperienceKind,
    VastSkipThreshold,
};

pub mod async_api {
    use std::path::Path;

    use crate::error::Result;
    use crate::models::{CreativeExperienceSettings, ExperienceKind};

    /// Read and decode a settings payload from a JSON file
    pub async fn read_settings(
        path: impl AsRef<Path>,
        kind: ExperienceKind,
    ) -> Result<CreativeExperienceSettings> {
        let content = tokio::fs::read(path).await?;
        // Decoding is CPU-bound and quick, so the sync version is fine here
        crate::decode::decode_slice(&content, kind)
    }

    /// Write settings to a JSON file in canonical form
    pub async fn write_settings(
        path: impl AsRef<Path>,
        settings: &CreativeExperienceSettings,
    ) -> Result<()> {
        let json = serde_json::to_vec_pretty(settings)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}
