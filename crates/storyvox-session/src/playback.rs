use async_trait::async_trait;

/// Story playback collaborator. The state machine is the sole arbiter of
/// audio focus between narration and interactive listening.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaybackControl: Send + Sync {
    async fn pause(&self);
    async fn resume(&self);
    async fn seek_to(&self, position_ms: u64);
    async fn position_ms(&self) -> u64;
    async fn is_playing(&self) -> bool;
}
