use anyhow::Result;
use opentelemetry::global;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_SERVICE_NAME: &str = "converge";

/// Where log records go. Human-readable output always goes to stderr;
/// stdout carries only the command's JSON results.
#[derive(Debug, Clone, PartialEq)]
pub enum LogSink {
    /// Plain fmt lines on stderr.
    Console,
    /// JSON lines appended to a file.
    File(PathBuf),
    /// Spans exported over OTLP/gRPC, plus console lines on stderr.
    Otlp { service_name: String },
}

impl LogSink {
    /// Reads `OTEL_EXPORTER` (`console`, `file`, `otlp`; `stdout` is kept as
    /// an alias of `console`), `LOG_FILE` and `OTEL_SERVICE_NAME`.
    pub fn from_env() -> Self {
        let exporter = std::env::var("OTEL_EXPORTER").ok();
        let log_file = std::env::var("LOG_FILE").ok();
        let service_name = std::env::var("OTEL_SERVICE_NAME").ok();

        Self::parse(exporter.as_deref(), log_file, service_name).unwrap_or_else(|| {
            eprintln!(
                "Unknown OTEL_EXPORTER: {}, falling back to console",
                exporter.as_deref().unwrap_or_default()
            );
            LogSink::Console
        })
    }

    fn parse(exporter: Option<&str>, log_file: Option<String>, service_name: Option<String>) -> Option<Self> {
        match exporter.unwrap_or("console") {
            "console" | "stdout" => Some(LogSink::Console),
            "file" => Some(LogSink::File(PathBuf::from(
                log_file.unwrap_or_else(|| format!("{}.log", DEFAULT_SERVICE_NAME)),
            ))),
            "otlp" => Some(LogSink::Otlp {
                service_name: service_name.unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            }),
            _ => None,
        }
    }
}

pub fn init_telemetry() -> Result<()> {
    init_sink(LogSink::from_env())
}

pub fn init_sink(sink: LogSink) -> Result<()> {
    match sink {
        LogSink::Console => {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(EnvFilter::from_default_env())
                .init();
        }
        LogSink::File(path) => {
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::sync::Arc::new(log_file))
                        .with_ansi(false)
                )
                .with(EnvFilter::from_default_env())
                .init();

            eprintln!("Logging to file: {}", path.display());
        }
        LogSink::Otlp { service_name } => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(opentelemetry_otlp::new_exporter().tonic())
                .with_trace_config(
                    opentelemetry_sdk::trace::config().with_resource(
                        opentelemetry_sdk::Resource::new(vec![
                            opentelemetry::KeyValue::new("service.name", service_name),
                        ])
                    )
                )
                .install_batch(opentelemetry_sdk::runtime::Tokio)?;

            tracing_subscriber::registry()
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(EnvFilter::from_default_env())
                .init();
        }
    }

    Ok(())
}

pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
