#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::{TempDir, tempdir};

/// Scratch directory holding input files and the artifact workspace of one test.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory passed as `--workspace` to the binary.
    pub fn artifacts(&self) -> PathBuf {
        self.temp_dir.path().join("artifacts")
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// The binary, pointed at this workspace's artifact directory.
    pub fn command(&self) -> Command {
        let mut command = Command::cargo_bin("billing-recon").expect("binary exists");
        command.arg("--workspace").arg(self.artifacts());
        command.env_remove("RUST_LOG");
        command
    }
}

pub const BILLING_CSV: &str = "\
Profesional,Codigo,Nombre Procedimiento,Ciudad,Fecha,Valor Unitario,Cantidad
123 - Ana Ruiz,001,Consulta,Cali,05/03/2024,,2
Luis Gil,XYZ,CONSULTA ,Bogota,20/03/2024,,1
Luis Gil,777,Terapia,Bogota,02/04/2024,15000,
";

pub const CATALOG_CSV: &str = "\
Codigo,Nombre Procedimiento,Valor
001,Consulta General,50000
001,Consulta Duplicada,99999
555,consulta,30000
";
