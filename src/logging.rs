use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a global tracing subscriber. Embedding applications that bring
/// their own subscriber can skip this; calling it twice is a no-op.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
