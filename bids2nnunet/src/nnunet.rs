//! Invocation of the external nnUNetv2 command-line tools.
//!
//! Preprocessing, training and inference are all delegated to nnUNetv2;
//! this module only assembles the command lines and the three directory
//! roots the framework reads from the environment. Invocations run
//! sequentially and block to completion; a non-zero exit halts the pipeline
//! with no retries.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::info;

use crate::error::{ConversionError, ConversionResult};

/// nnUNetv2 configuration used for 2D microscopy slices.
pub const DEFAULT_CONFIGURATION: &str = "2d";

/// Number of cross-validation folds nnUNetv2 trains by default.
pub const NUM_FOLDS: u32 = 5;

/// The three directory roots nnUNetv2 expects in its environment.
#[derive(Debug, Clone)]
pub struct NnUnetEnv {
    /// Exported as `nnUNet_raw`.
    pub raw_dir: PathBuf,
    /// Exported as `nnUNet_preprocessed`.
    pub preprocessed_dir: PathBuf,
    /// Exported as `nnUNet_results`.
    pub results_dir: PathBuf,
}

impl NnUnetEnv {
    /// Derive the three roots from a conversion target directory, matching
    /// the layout the converter produces.
    pub fn from_target_dir(target_dir: &Path) -> Self {
        Self {
            raw_dir: target_dir.join("nnUNet_raw"),
            preprocessed_dir: target_dir.join("nnUNet_preprocessed"),
            results_dir: target_dir.join("nnUNet_results"),
        }
    }

    fn apply(&self, command: &mut Command) {
        command
            .env("nnUNet_raw", &self.raw_dir)
            .env("nnUNet_preprocessed", &self.preprocessed_dir)
            .env("nnUNet_results", &self.results_dir);
    }
}

/// Which trained checkpoint inference should load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// The best checkpoint seen during training.
    Best,
    /// The checkpoint written at the end of training.
    Final,
}

impl Checkpoint {
    /// The checkpoint file name nnUNetv2 uses.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Best => "checkpoint_best.pth",
            Self::Final => "checkpoint_final.pth",
        }
    }
}

/// Compute device passed to nnUNetv2 inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    Cpu,
}

impl Device {
    const fn as_arg(self) -> &'static str {
        match self {
            Self::Cuda => "cuda",
            Self::Cpu => "cpu",
        }
    }
}

/// Runner assembling and waiting on nnUNetv2 invocations.
pub struct NnUnetRunner {
    env: NnUnetEnv,
}

impl NnUnetRunner {
    pub fn new(env: NnUnetEnv) -> Self {
        Self { env }
    }

    /// `nnUNetv2_plan_and_preprocess -d <id> --verify_dataset_integrity`
    pub fn plan_and_preprocess(&self, dataset_id: u32) -> ConversionResult<()> {
        self.run(self.plan_and_preprocess_command(dataset_id))
    }

    fn plan_and_preprocess_command(&self, dataset_id: u32) -> Command {
        let mut command = Command::new("nnUNetv2_plan_and_preprocess");
        command
            .arg("-d")
            .arg(dataset_id.to_string())
            .arg("--verify_dataset_integrity");
        self.env.apply(&mut command);
        command
    }

    /// `nnUNetv2_train <id> <configuration> <fold>`
    pub fn train(&self, dataset_id: u32, configuration: &str, fold: u32) -> ConversionResult<()> {
        self.run(self.train_command(dataset_id, configuration, fold))
    }

    fn train_command(&self, dataset_id: u32, configuration: &str, fold: u32) -> Command {
        let mut command = Command::new("nnUNetv2_train");
        command
            .arg(dataset_id.to_string())
            .arg(configuration)
            .arg(fold.to_string());
        self.env.apply(&mut command);
        command
    }

    /// Train every cross-validation fold in sequence, halting at the first
    /// failure rather than continuing with the remaining folds.
    pub fn train_all_folds(&self, dataset_id: u32, configuration: &str) -> ConversionResult<()> {
        for fold in 0..NUM_FOLDS {
            info!("Training fold {fold}/{}", NUM_FOLDS - 1);
            self.train(dataset_id, configuration, fold)?;
        }
        Ok(())
    }

    /// `nnUNetv2_predict -i <in> -o <out> -d <id> -c <configuration>
    /// -f 0 1 2 3 4 -chk <checkpoint> -device <device>`
    pub fn predict(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        dataset_id: u32,
        configuration: &str,
        checkpoint: Checkpoint,
        device: Device,
    ) -> ConversionResult<()> {
        self.run(self.predict_command(
            input_dir,
            output_dir,
            dataset_id,
            configuration,
            checkpoint,
            device,
        ))
    }

    fn predict_command(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        dataset_id: u32,
        configuration: &str,
        checkpoint: Checkpoint,
        device: Device,
    ) -> Command {
        let mut command = Command::new("nnUNetv2_predict");
        command
            .arg("-i")
            .arg(input_dir)
            .arg("-o")
            .arg(output_dir)
            .arg("-d")
            .arg(dataset_id.to_string())
            .arg("-c")
            .arg(configuration)
            .arg("-f");
        for fold in 0..NUM_FOLDS {
            command.arg(fold.to_string());
        }
        command
            .arg("-chk")
            .arg(checkpoint.file_name())
            .arg("-device")
            .arg(device.as_arg());
        self.env.apply(&mut command);
        command
    }

    fn run(&self, mut command: Command) -> ConversionResult<()> {
        let rendered = render_command(&command);
        info!("Running: {rendered}");

        let status = command.status().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConversionError::CommandNotFound {
                    program: command.get_program().to_string_lossy().into_owned(),
                }
            } else {
                ConversionError::io(PathBuf::from(command.get_program()), e)
            }
        })?;

        if !status.success() {
            return Err(ConversionError::CommandFailed {
                command: rendered,
                code: status.code(),
            });
        }
        Ok(())
    }
}

fn render_command(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> NnUnetRunner {
        NnUnetRunner::new(NnUnetEnv::from_target_dir(Path::new("/data/target")))
    }

    fn env_value(command: &Command, key: &str) -> String {
        command
            .get_envs()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v)
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn preprocess_command_verifies_dataset_integrity() {
        let command = runner().plan_and_preprocess_command(1);
        let rendered = render_command(&command);
        assert_eq!(
            rendered,
            "nnUNetv2_plan_and_preprocess -d 1 --verify_dataset_integrity"
        );
    }

    #[test]
    fn directory_roots_are_exported_to_the_environment() {
        let command = runner().train_command(1, DEFAULT_CONFIGURATION, 0);
        assert_eq!(env_value(&command, "nnUNet_raw"), "/data/target/nnUNet_raw");
        assert_eq!(
            env_value(&command, "nnUNet_preprocessed"),
            "/data/target/nnUNet_preprocessed"
        );
        assert_eq!(
            env_value(&command, "nnUNet_results"),
            "/data/target/nnUNet_results"
        );
    }

    #[test]
    fn train_command_names_dataset_configuration_and_fold() {
        let command = runner().train_command(7, "2d", 3);
        assert_eq!(render_command(&command), "nnUNetv2_train 7 2d 3");
    }

    #[test]
    fn predict_command_selects_folds_checkpoint_and_device() {
        let command = runner().predict_command(
            Path::new("/data/in"),
            Path::new("/data/out"),
            1,
            "2d",
            Checkpoint::Best,
            Device::Cpu,
        );
        assert_eq!(
            render_command(&command),
            "nnUNetv2_predict -i /data/in -o /data/out -d 1 -c 2d \
             -f 0 1 2 3 4 -chk checkpoint_best.pth -device cpu"
        );
    }

    #[test]
    fn checkpoint_file_names_match_nnunet_conventions() {
        let best = Checkpoint::Best.file_name();
        let final_ = Checkpoint::Final.file_name();
        assert_eq!(best, "checkpoint_best.pth");
        assert_eq!(final_, "checkpoint_final.pth");
    }

    #[test]
    fn missing_binary_reports_command_not_found() {
        let mut command = Command::new("nnUNetv2_definitely_not_installed");
        command.arg("-d").arg("1");
        let err = runner().run(command).unwrap_err();
        assert!(matches!(err, ConversionError::CommandNotFound { .. }));
    }
}
