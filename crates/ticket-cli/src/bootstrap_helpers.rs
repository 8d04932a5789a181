use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_TICKET_LOG_DIRECTIVES: &str =
    "ticket_discord_runtime=info,ticket_commands=info,ticket_lifecycle=info";

pub(crate) fn init_tracing() {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::WARN.into());
    let env_filter = if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        builder.from_env_lossy()
    } else {
        builder.parse_lossy(DEFAULT_TICKET_LOG_DIRECTIVES)
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
