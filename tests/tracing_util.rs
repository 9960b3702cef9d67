use tracing_subscriber::EnvFilter;

/// Per-test tracing guard: installs a compact fmt subscriber routed to the
/// test writer, torn down when the guard drops.
pub struct TestTracing {
    _guard: tracing::subscriber::DefaultGuard,
}

impl TestTracing {
    pub fn init() -> Self {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("duolane=debug")),
            )
            .with_test_writer()
            .compact()
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        Self { _guard: guard }
    }
}

/// Test prelude: apply the configured coroutine stack size and install
/// tracing.
#[allow(dead_code)]
pub fn init_runtime() -> TestTracing {
    let size = std::env::var("DUOLANE_STACK_SIZE")
        .ok()
        .and_then(|v| {
            if let Some(hex) = v.strip_prefix("0x") {
                usize::from_str_radix(hex, 16).ok()
            } else {
                v.parse().ok()
            }
        })
        .unwrap_or(0x4000);
    may::config().set_stack_size(size);
    TestTracing::init()
}
