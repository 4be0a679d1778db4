//! Packaging of run artifacts into a single archive.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::runner::error::{Result, RunnerError};

/// File the runner receives its parameters in.
pub const PARAMETERS_FILE: &str = "parameters.json";

/// Captured stdout/stderr of the external program.
pub const RUNNER_LOG_FILE: &str = "runner.log";

/// Archive name used when none is configured.
pub const DEFAULT_BUNDLE_NAME: &str = "results.zip";

/// Zip every artifact in `working_dir` into `bundle_path`, then remove them.
///
/// Only regular files at the top level are artifacts. The parameters file,
/// the runner log, and the bundle itself are left in place. Returns the
/// archived file names in archive order.
pub fn bundle_artifacts(working_dir: &Path, bundle_path: &Path) -> Result<Vec<String>> {
    let artifacts = collect_artifacts(working_dir, bundle_path)?;

    let file = File::create(bundle_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut names = Vec::with_capacity(artifacts.len());
    for path in &artifacts {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| RunnerError::Bundle {
                path: bundle_path.to_path_buf(),
                reason: format!("artifact without a file name: {}", path.display()),
            })?;

        zip.start_file(name.as_str(), options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut zip)?;
        names.push(name);
    }

    let mut writer = zip.finish()?;
    io::Write::flush(&mut writer)?;

    for path in &artifacts {
        fs::remove_file(path)?;
    }

    tracing::debug!(
        bundle = %bundle_path.display(),
        files = names.len(),
        "Bundled run artifacts"
    );
    Ok(names)
}

fn collect_artifacts(working_dir: &Path, bundle_path: &Path) -> Result<Vec<PathBuf>> {
    let mut artifacts = Vec::new();

    for entry in fs::read_dir(working_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        if path == bundle_path {
            continue;
        }

        let name = entry.file_name();
        if name == PARAMETERS_FILE || name == RUNNER_LOG_FILE {
            continue;
        }

        artifacts.push(path);
    }

    artifacts.sort();
    Ok(artifacts)
}
