use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Dependencies that log per request or per connection; kept quiet unless `RUST_LOG` says otherwise.
const NOISY_TARGETS: &[&str] = &["warp", "hyper"];

/// Install the global subscriber. `RUST_LOG` takes precedence over `log_level`.
pub fn init_logging(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().compact().with_target(false))
        .init();

    tracing::info!("📝 Logging initialized at level: {}", log_level);
}

fn default_directives(log_level: &str) -> String {
    let mut directives = log_level.trim().to_string();
    if directives.is_empty() {
        directives.push_str("info");
    }
    for target in NOISY_TARGETS {
        directives.push_str(&format!(",{}=warn", target));
    }
    directives
}
