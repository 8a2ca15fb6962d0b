use std::io;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const STDOUT_DEFAULT_FILTER: &str = "info,web_request=warn,reqwest=warn,hyper=off";
const FILE_FILTER: &str =
    "info,web_request=debug,checkpoint=debug,coordinator=debug,registry=debug,entity=debug,hyper=off";

pub fn configure_logging() {
    // RUST_LOG overrides the stdout filter only; the file log always keeps debug detail.
    let stdout_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(STDOUT_DEFAULT_FILTER));

    let stdout_log = fmt::layer()
        .with_writer(io::stdout)
        .with_target(true)
        .with_filter(stdout_filter);

    let file_appender = rolling::daily("logs", "harvester.log");
    let file_log = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_filter(EnvFilter::new(FILE_FILTER));

    tracing_subscriber::Registry::default()
        .with(stdout_log)
        .with(file_log)
        .init();
}
