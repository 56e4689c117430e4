//! PDF↔Word through a headless LibreOffice.

use super::DocumentCodec;
use crate::error::CodecError;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Which way an [`OfficeCodec`] converts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeTarget {
    /// PDF in, Word out. The PDF is opened with Writer's PDF import filter.
    Docx,
    /// Word in, PDF out.
    Pdf,
}

impl OfficeTarget {
    fn convert_to(self) -> &'static str {
        match self {
            OfficeTarget::Docx => "docx:MS Word 2007 XML",
            OfficeTarget::Pdf => "pdf:writer_pdf_Export",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            OfficeTarget::Docx => "docx",
            OfficeTarget::Pdf => "pdf",
        }
    }
}

/// Runs `soffice --headless --convert-to` in a scratch directory.
///
/// Each call gets its own user profile under the scratch directory so
/// concurrent conversions do not contend for LibreOffice's profile lock.
#[derive(Debug, Clone)]
pub struct OfficeCodec {
    program: String,
    target: OfficeTarget,
}

impl OfficeCodec {
    pub fn new(program: impl Into<String>, target: OfficeTarget) -> Self {
        Self {
            program: program.into(),
            target,
        }
    }
}

impl DocumentCodec for OfficeCodec {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), CodecError> {
        let scratch = tempfile::Builder::new().prefix("docconv-office-").tempdir()?;
        let outdir = scratch.path().join("out");
        std::fs::create_dir_all(&outdir)?;
        let profile = format!(
            "-env:UserInstallation=file://{}",
            scratch.path().join("profile").display()
        );

        let mut cmd = Command::new(&self.program);
        cmd.arg("--headless")
            .arg("--norestore")
            .arg(&profile);
        if self.target == OfficeTarget::Docx {
            cmd.arg("--infilter=writer_pdf_import");
        }
        cmd.arg("--convert-to")
            .arg(self.target.convert_to())
            .arg("--outdir")
            .arg(&outdir)
            .arg(input);

        debug!(program = %self.program, input = %input.display(), "starting office conversion");
        run(&mut cmd, &self.program)?;

        let produced = std::fs::read_dir(&outdir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .find(|p| {
                p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(self.target.extension()))
            })
            .ok_or_else(|| CodecError::NoOutput {
                path: outdir.clone(),
            })?;
        std::fs::copy(&produced, output)?;
        info!(output = %output.display(), target = self.target.extension(), "office conversion done");
        Ok(())
    }
}

/// Run `cmd` to completion, returning its stdout.
pub(crate) fn run(cmd: &mut Command, program: &str) -> Result<Vec<u8>, CodecError> {
    let out = cmd.output().map_err(|source| CodecError::Spawn {
        program: program.to_string(),
        source,
    })?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(CodecError::Exited {
            program: program.to_string(),
            status: out.status.to_string(),
            stderr: stderr.trim().chars().take(500).collect(),
        });
    }
    Ok(out.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, b"%PDF-1.4").unwrap();
        let codec = OfficeCodec::new("docconvert-no-such-office-binary", OfficeTarget::Docx);
        let err = codec.convert(&input, &dir.path().join("out.docx")).unwrap_err();
        assert!(matches!(err, CodecError::Spawn { .. }), "got: {err}");
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_is_exit_error() {
        let mut cmd = Command::new("false");
        let err = run(&mut cmd, "false").unwrap_err();
        assert!(matches!(err, CodecError::Exited { .. }));
    }
}
