use std::io;
use std::path::PathBuf;
use std::thread;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use mztransport::{MeasureError, PointMeasure, TransportParams, DEFAULT_ANOMALY_DISTANCE};

use crate::args::{non_negative_float, proportion};
use crate::proc::{
    describe_scores, log_anomalies, make_estimate, read_measure, score_references,
    PreprocessingSteps,
};
use crate::write::{
    write_fitted_outputs, write_summary, write_summary_file, ReferenceScore, TransportSummary,
};

#[derive(Debug, Error)]
pub enum MZTransporterError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to read peak list {}: {source}", path.display())]
    InputError {
        path: PathBuf,
        #[source]
        source: MeasureError,
    },
    #[error(transparent)]
    ProcessingError(#[from] MeasureError),
    #[error("Expected one proportion per reference ({expected}), but {found} were given")]
    ProportionMismatch { expected: usize, found: usize },
    #[error("Failed to create the thread pool: {0}")]
    ThreadPoolError(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to load the configuration: {0}")]
    ConfigurationError(#[from] figment::Error),
}

/// Compare a mass spectrum to reference spectra by their Wasserstein distance.
///
/// Read an observed peak list and one or more reference peak lists, score each reference
/// against the observed spectrum, and fit the observed spectrum with a mixture of the
/// references.
#[derive(Parser, Debug, Default, Clone, Deserialize, Serialize)]
#[command(author, version)]
#[serde(default)]
pub struct MZTransporter {
    /// The path to read the observed peak list from, which may be gzip compressed
    #[arg()]
    pub observed: PathBuf,

    /// The paths to read the reference peak lists from
    #[arg(required = true, num_args = 1..)]
    pub references: Vec<PathBuf>,

    /// The proportions to mix the references with, separated by commas.
    ///
    /// They need not sum to one. If omitted, every reference gets an equal share.
    #[arg(short = 'p', long = "proportions", value_delimiter = ',')]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub proportions: Vec<f64>,

    /// The prefix for output files. If omitted, the summary is written to STDOUT.
    ///
    /// Writes `PREFIX_fitted.txt`, `PREFIX_transport.txt` and `PREFIX_summary.json`
    #[arg(short = 'o', long = "output-prefix")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_prefix: Option<PathBuf>,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mztransporter.toml` in the working directory.
    /// Environment variables prefixed with `MZTRANSPORTER_` will be read too.
    #[arg(long = "config-file")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(short = 't', long = "threads")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<i32>,

    /// Remove the smallest observed peaks accounting for this proportion of the total signal
    #[arg(short = 'c', long = "cut-smallest", value_parser = proportion)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cut_smallest: Option<f64>,

    /// Remove observed peaks further than this m/z margin from every reference peak
    #[arg(short = 'm', long = "filter-margin", value_parser = non_negative_float)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_margin: Option<f64>,

    /// Round all m/z values to this many decimal digits before scoring
    #[arg(short = 'b', long = "bin-digits")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_digits: Option<i32>,

    /// Report transport plan entries moving signal further than this m/z distance
    #[arg(short = 'd', long = "anomaly-distance", value_parser = non_negative_float)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly_distance: Option<f64>,

    /// Omit transport plan entries moving less than this much signal from the output
    #[arg(short = 'w', long = "min-move", value_parser = non_negative_float)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_move: Option<f64>,
}

impl MZTransporter {
    fn create_threadpool(&self) -> Result<rayon::ThreadPool, MZTransporterError> {
        let num_threads = match self.threads {
            Some(n) if n > 0 => n as usize,
            _ => thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        };
        debug!("Using {} cores", num_threads);
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?)
    }

    fn transport_params(&self) -> TransportParams {
        TransportParams::default()
            .with_anomaly_distance(self.anomaly_distance.unwrap_or(DEFAULT_ANOMALY_DISTANCE))
    }

    fn preprocessing(&self, params: &TransportParams) -> PreprocessingSteps {
        PreprocessingSteps {
            prune_threshold: params.prune_threshold,
            bin_digits: self.bin_digits,
            cut_smallest: self.cut_smallest,
            filter_margin: self.filter_margin,
        }
    }

    fn read_inputs(&self) -> Result<(PointMeasure, Vec<PointMeasure>), MZTransporterError> {
        let read = |path: &PathBuf| {
            read_measure(path).map_err(|source| MZTransporterError::InputError {
                path: path.clone(),
                source,
            })
        };
        let observed = read(&self.observed)?;
        let references = self
            .references
            .iter()
            .map(read)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((observed, references))
    }

    /// Score every reference and the fitted mixture against the observed peak list,
    /// writing the output files when an output prefix is configured.
    pub fn run(&self) -> Result<TransportSummary, MZTransporterError> {
        let estimate = make_estimate(&self.proportions, self.references.len()).ok_or(
            MZTransporterError::ProportionMismatch {
                expected: self.references.len(),
                found: self.proportions.len(),
            },
        )?;
        let weights = estimate.normalized_proportions()?;

        let (mut observed, mut references) = self.read_inputs()?;
        info!(
            "Read {} observed peaks and {} references",
            observed.len(),
            references.len()
        );
        let params = self.transport_params();
        self.preprocessing(&params).apply(&mut observed, &mut references)?;

        let scores = score_references(&observed, &references, &params)?;
        describe_scores(self.references.iter().map(|p| p.as_path()), &scores);

        let fitted = estimate.fitted_with(&references, params.prune_threshold)?;
        let fitted_score = fitted.distance_with(&observed, &params)?;
        log_anomalies("fitted", &fitted_score);
        info!("Fitted mixture distance: {:.6}", fitted_score.distance);

        let transport_entries = match self.output_prefix.as_ref() {
            Some(prefix) => {
                write_fitted_outputs(prefix, &fitted, &observed, self.min_move.unwrap_or(0.0))?
            }
            None => {
                let min_move = self.min_move.unwrap_or(0.0);
                fitted
                    .transport_plan(&observed)?
                    .filter(|step| step.weight >= min_move)
                    .count()
            }
        };

        let summary = TransportSummary {
            version: option_env!("CARGO_PKG_VERSION")
                .unwrap_or("unknown")
                .to_string(),
            observed: self.observed.clone(),
            observed_peaks: observed.len(),
            references: self
                .references
                .iter()
                .zip(references.iter())
                .zip(weights)
                .zip(scores)
                .map(|(((path, reference), proportion), score)| {
                    log_anomalies(&path.display().to_string(), &score);
                    ReferenceScore {
                        path: path.clone(),
                        peaks: reference.len(),
                        proportion,
                        distance: score.distance,
                        anomalies: score.anomalies,
                    }
                })
                .collect(),
            fitted_peaks: fitted.len(),
            fitted_distance: fitted_score.distance,
            fitted_anomalies: fitted_score.anomalies,
            transport_entries,
        };
        if let Some(prefix) = self.output_prefix.as_ref() {
            write_summary_file(prefix, &summary)?;
        }
        Ok(summary)
    }

    pub fn main(&self) -> Result<(), MZTransporterError> {
        info!(
            "mztransporter v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Observed: {}", self.observed.display());
        for reference in self.references.iter() {
            info!("Reference: {}", reference.display());
        }
        let summary = self.create_threadpool()?.install(|| self.run())?;
        if let Some(best) = summary.best_reference() {
            info!("Closest reference: {} ({:.6})", best.path.display(), best.distance);
        }
        if self.output_prefix.is_none() {
            write_summary(io::stdout().lock(), &summary)?;
        }
        Ok(())
    }
}
