use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `ENV=production` switches log output to JSON lines.
pub fn is_production() -> bool {
    std::env::var("ENV")
        .or_else(|_| std::env::var("HAPPY_LUNCH__ENV"))
        .map(|v| v.eq_ignore_ascii_case("production"))
        .unwrap_or(false)
}

fn default_directives(service_name: &str) -> String {
    let crate_target = service_name.replace('-', "_");
    format!("info,{crate_target}=debug,tower_http=debug,socketioxide=info")
}

pub fn init_tracing(service_name: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(service_name)));

    if is_production() {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    tracing::info!(service = service_name, production = is_production(), "tracing initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_use_crate_target() {
        let directives = default_directives("happy-api");
        assert!(directives.contains("happy_api=debug"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
