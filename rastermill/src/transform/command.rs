//! External-command transform.
//!
//! Runs a user-supplied command once per work item, substituting job fields
//! into a template. Because each invocation is a separate OS process, the
//! transform is externally cancellable and its raster environment dies with
//! the process, keeping workers fully isolated from one another.

use super::{Transform, TransformError, TransformJob};
use std::process::Command;
use tracing::debug;

/// A transform that shells out to an external geoprocessing command.
///
/// The template is split on whitespace into a program and arguments. Each
/// argument may contain placeholders, replaced per job:
///
/// | placeholder | value |
/// |-------------|-------|
/// | `{input}`   | source raster path |
/// | `{output}`  | output artifact path |
/// | `{id}`      | item identifier |
/// | `{xmin}` `{ymin}` `{xmax}` `{ymax}` | clip extent bounds |
/// | `{cellsize}` | context cell size |
///
/// A placeholder whose value is unavailable for a given job (e.g. `{xmin}`
/// in batch mode with no clip extent) fails that job with
/// [`TransformError::Template`], leaving the rest of the run untouched.
pub struct CommandTransform {
    program: String,
    args: Vec<String>,
}

impl CommandTransform {
    /// Parses a whitespace-separated command template.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Template`] if the template is empty.
    pub fn from_template(template: &str) -> Result<Self, TransformError> {
        let mut tokens = template.split_whitespace().map(str::to_owned);
        let program = tokens
            .next()
            .ok_or_else(|| TransformError::Template("empty command template".into()))?;
        Ok(Self {
            program,
            args: tokens.collect(),
        })
    }

    fn expand(&self, arg: &str, job: &TransformJob) -> Result<String, TransformError> {
        let mut out = arg.to_owned();

        if out.contains("{input}") {
            let input = job
                .input
                .as_ref()
                .ok_or_else(|| TransformError::MissingInput(job.item.id()))?;
            out = out.replace("{input}", &input.to_string_lossy());
        }
        out = out.replace("{output}", &job.output.to_string_lossy());
        out = out.replace("{id}", &job.item.id());

        if let Some(extent) = &job.context.clip_extent {
            out = out
                .replace("{xmin}", &extent.x_min.to_string())
                .replace("{ymin}", &extent.y_min.to_string())
                .replace("{xmax}", &extent.x_max.to_string())
                .replace("{ymax}", &extent.y_max.to_string());
        }
        if let Some(cell_size) = job.context.cell_size {
            out = out.replace("{cellsize}", &cell_size.to_string());
        }

        if out.contains('{') && out.contains('}') {
            return Err(TransformError::Template(format!(
                "unresolved placeholder in argument '{}'",
                out
            )));
        }
        Ok(out)
    }
}

impl Transform for CommandTransform {
    fn apply(&self, job: &TransformJob) -> Result<(), TransformError> {
        let args = self
            .args
            .iter()
            .map(|arg| self.expand(arg, job))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            program = %self.program,
            item = %job.item,
            output = %job.output.display(),
            "Invoking transform command"
        );

        let output = Command::new(&self.program).args(&args).output()?;
        if !output.status.success() {
            return Err(TransformError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::WorkItem;
    use crate::extent::Extent;
    use crate::transform::JobPlan;
    use std::path::PathBuf;

    fn tile_job() -> TransformJob {
        let extent = Extent::new(0.0, 0.0, 50.0, 25.0).unwrap();
        JobPlan::new("/out", ".tif")
            .with_source("/in/big.tif")
            .job_for(WorkItem::Tile { index: 2, extent })
    }

    #[test]
    fn test_from_template_rejects_empty() {
        assert!(matches!(
            CommandTransform::from_template("   "),
            Err(TransformError::Template(_))
        ));
    }

    #[test]
    fn test_expand_substitutes_job_fields() {
        let transform =
            CommandTransform::from_template("gdalwarp -te {xmin} {ymin} {xmax} {ymax} {input} {output}")
                .unwrap();
        let job = tile_job();

        let args: Vec<String> = transform
            .args
            .iter()
            .map(|a| transform.expand(a, &job).unwrap())
            .collect();
        assert_eq!(
            args,
            vec!["-te", "0", "0", "50", "25", "/in/big.tif", "/out/2_fnl.tif"]
        );
    }

    #[test]
    fn test_expand_missing_input_fails() {
        let transform = CommandTransform::from_template("tool {input}").unwrap();
        let extent = Extent::new(0.0, 0.0, 1.0, 1.0).unwrap();
        let job = JobPlan::new("/out", ".tif").job_for(WorkItem::Tile { index: 1, extent });

        assert!(matches!(
            transform.expand(&transform.args[0], &job),
            Err(TransformError::MissingInput(_))
        ));
    }

    #[test]
    fn test_expand_unresolved_placeholder_fails() {
        let transform = CommandTransform::from_template("tool {cellsize}").unwrap();
        let job = JobPlan::new("/out", ".tif").job_for(WorkItem::File {
            path: PathBuf::from("a.tif"),
        });

        assert!(matches!(
            transform.expand(&transform.args[0], &job),
            Err(TransformError::Template(_))
        ));
    }

    #[test]
    fn test_apply_runs_command() {
        let dir = tempfile::tempdir().unwrap();
        let transform = CommandTransform::from_template("touch {output}").unwrap();
        let job = JobPlan::new(dir.path(), ".tif").job_for(WorkItem::File {
            path: PathBuf::from("a.tif"),
        });

        transform.apply(&job).unwrap();
        assert!(dir.path().join("a_fnl.tif").exists());
    }

    #[test]
    fn test_apply_surfaces_command_failure() {
        let transform = CommandTransform::from_template("false").unwrap();
        let job = JobPlan::new("/out", ".tif").job_for(WorkItem::File {
            path: PathBuf::from("a.tif"),
        });

        assert!(matches!(
            transform.apply(&job),
            Err(TransformError::CommandFailed { .. })
        ));
    }
}
