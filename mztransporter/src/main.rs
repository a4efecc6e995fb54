use std::fs;
use std::io;
use std::path::Path;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mztransporter::{MZTransporter, MZTransporterError};

#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn configure_log(log_file: Option<&Path>) -> io::Result<Option<WorkerGuard>> {
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()))
        .with(
            fmt::layer()
                .compact()
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(io::stderr)
                .with_filter(
                    EnvFilter::builder()
                        .with_default_directive(tracing::Level::INFO.into())
                        .from_env_lossy(),
                ),
        );

    match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(fs::File::create(path)?);
            subscriber
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_timer(fmt::time::ChronoLocal::rfc_3339())
                        .with_writer(writer)
                        .with_filter(
                            EnvFilter::builder()
                                .with_default_directive(tracing::Level::DEBUG.into())
                                .from_env_lossy(),
                        ),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            subscriber.init();
            Ok(None)
        }
    }
}

fn main() -> Result<(), MZTransporterError> {
    let args = MZTransporter::parse();

    let mut config = Figment::new().merge(Toml::file("mztransporter.toml"));
    if let Some(path) = args.config_file.as_ref() {
        config = config.merge(Toml::file_exact(path));
    }
    let driver: MZTransporter = config
        .merge(Env::prefixed("MZTRANSPORTER_"))
        .merge(Serialized::defaults(&args))
        .extract()?;

    let _guard = configure_log(driver.log_file.as_deref())?;
    driver.main()?;
    Ok(())
}
