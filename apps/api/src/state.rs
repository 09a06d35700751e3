use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::notifications::Notifier;
use crate::text::HtmlCache;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    /// Outbound mail queue. Publish failures are logged, never propagated.
    pub notifier: Arc<dyn Notifier>,
    /// Memoized plain-text → HTML derivation used by serializers.
    pub html_cache: Arc<HtmlCache>,
    pub config: Config,
}
