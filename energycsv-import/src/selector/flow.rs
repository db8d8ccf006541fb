//! Two-step setup wizard: choose a folder, then choose one file in it.

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use super::{extract_meter_id_with, list_files, validate_folder, FolderPath};
use crate::config::{IntegrationConfig, SelectorConfig};

/// Finished setup result, persisted by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Meter id; doubles as the entry title and uniqueness key.
    pub title: String,
    pub data: EntryData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    pub filename: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    User,
    ChooseFile,
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowStep::User => f.write_str("user"),
            FlowStep::ChooseFile => f.write_str("choosefile"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    NoFilesFound,
    FlowFinished,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::NoFilesFound => f.write_str("no_files_found"),
            AbortReason::FlowFinished => f.write_str("flow_finished"),
        }
    }
}

/// A form the host should display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub step: FlowStep,
    /// Name of the single input field.
    pub field: String,
    /// Allowed values for the field; empty means free text.
    pub choices: Vec<PathBuf>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowResult {
    ShowForm(Form),
    CreateEntry(ConfigEntry),
    Abort { reason: AbortReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    Init,
    AwaitFolder,
    AwaitFile,
    Done,
    Aborted,
}

#[derive(Debug, Clone)]
enum FlowState {
    Init,
    AwaitFolder,
    AwaitFile { files: Vec<PathBuf> },
    Done,
    Aborted,
}

pub struct ConfigFlow {
    integration: IntegrationConfig,
    selector: SelectorConfig,
    meter_column: String,
    folder: Option<FolderPath>,
    state: FlowState,
}

impl ConfigFlow {
    pub fn new(
        integration: IntegrationConfig,
        selector: SelectorConfig,
        meter_column: impl Into<String>,
    ) -> Self {
        Self {
            integration,
            selector,
            meter_column: meter_column.into(),
            folder: None,
            state: FlowState::Init,
        }
    }

    pub fn phase(&self) -> FlowPhase {
        match self.state {
            FlowState::Init => FlowPhase::Init,
            FlowState::AwaitFolder => FlowPhase::AwaitFolder,
            FlowState::AwaitFile { .. } => FlowPhase::AwaitFile,
            FlowState::Done => FlowPhase::Done,
            FlowState::Aborted => FlowPhase::Aborted,
        }
    }

    /// Folder step. `None` shows the empty form.
    pub fn step_user(&mut self, folder: Option<&str>) -> FlowResult {
        if self.is_finished() {
            return FlowResult::Abort {
                reason: AbortReason::FlowFinished,
            };
        }

        let Some(input) = folder else {
            return self.folder_form(None);
        };

        match validate_folder(input) {
            Ok(folder) => {
                tracing::info!(folder = %folder, "folder accepted");
                self.folder = Some(folder);
                self.step_choose_file(None)
            }
            Err(e) => self.folder_form(Some(e.to_string())),
        }
    }

    /// File step. `None` lists the held folder's files.
    pub fn step_choose_file(&mut self, selection: Option<&str>) -> FlowResult {
        if self.is_finished() {
            return FlowResult::Abort {
                reason: AbortReason::FlowFinished,
            };
        }

        let Some(folder) = self.folder.clone() else {
            return self.folder_form(None);
        };

        let Some(selection) = selection else {
            let files = list_files(
                folder.as_path(),
                &self.selector.pattern,
                self.selector.sort,
                self.selector.recursive,
            );
            tracing::debug!(folder = %folder, ?files, "files found");
            if files.is_empty() {
                self.state = FlowState::Aborted;
                return FlowResult::Abort {
                    reason: AbortReason::NoFilesFound,
                };
            }
            self.state = FlowState::AwaitFile {
                files: files.clone(),
            };
            return self.file_form(files, None);
        };

        let files = match &self.state {
            FlowState::AwaitFile { files } => files.clone(),
            _ => return self.step_choose_file(None),
        };

        let path = PathBuf::from(selection);
        if !files.contains(&path) {
            return self.file_form(files, Some(format!("'{selection}' is not one of the listed files")));
        }

        match extract_meter_id_with(&path, &self.meter_column) {
            Ok(meter_id) => {
                tracing::info!(%meter_id, "create entry");
                self.state = FlowState::Done;
                FlowResult::CreateEntry(ConfigEntry {
                    title: meter_id,
                    data: EntryData { filename: path },
                })
            }
            Err(e) => {
                tracing::error!(path = %path.display(), "no meter id found in csv file");
                self.folder = None;
                self.folder_form(Some(e.to_string()))
            }
        }
    }

    fn is_finished(&self) -> bool {
        matches!(self.state, FlowState::Done | FlowState::Aborted)
    }

    fn folder_form(&mut self, error: Option<String>) -> FlowResult {
        self.state = FlowState::AwaitFolder;
        FlowResult::ShowForm(Form {
            step: FlowStep::User,
            field: self.integration.folder_key.clone(),
            choices: Vec::new(),
            error,
        })
    }

    fn file_form(&self, files: Vec<PathBuf>, error: Option<String>) -> FlowResult {
        FlowResult::ShowForm(Form {
            step: FlowStep::ChooseFile,
            field: self.integration.filename_key.clone(),
            choices: files,
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::Path};

    const HEADER: &str = "Anlid;Datum;Förbrukn;Enhet";

    fn flow() -> ConfigFlow {
        ConfigFlow::new(IntegrationConfig::default(), SelectorConfig::default(), "Anlid")
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn expect_form(result: FlowResult) -> Form {
        match result {
            FlowResult::ShowForm(form) => form,
            other => panic!("expected form, got {other:?}"),
        }
    }

    #[test]
    fn initial_step_shows_folder_form() {
        let mut flow = flow();
        assert_eq!(flow.phase(), FlowPhase::Init);

        let form = expect_form(flow.step_user(None));
        assert_eq!(form.step, FlowStep::User);
        assert_eq!(form.field, "select_folder");
        assert!(form.error.is_none());
        assert_eq!(flow.phase(), FlowPhase::AwaitFolder);
    }

    #[test]
    fn missing_folder_redisplays_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("missing").display().to_string();
        let mut flow = flow();

        let form = expect_form(flow.step_user(Some(&input)));
        assert_eq!(form.step, FlowStep::User);
        assert_eq!(form.error, Some(format!("Folder '{input}' does not exist")));
        assert_eq!(flow.phase(), FlowPhase::AwaitFolder);
    }

    #[test]
    fn folder_without_csv_redisplays_with_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "readme.txt", "x");
        let input = dir.path().display().to_string();
        let mut flow = flow();

        let form = expect_form(flow.step_user(Some(&input)));
        assert_eq!(form.error, Some(format!("No CSV files found in '{input}'")));
        assert_eq!(flow.phase(), FlowPhase::AwaitFolder);
    }

    #[test]
    fn happy_path_creates_entry() {
        let dir = tempfile::tempdir().unwrap();
        let b = write(dir.path(), "b.csv", &format!("{HEADER}\n222;2024-01-01 00:00:00;1,0;kWh\n"));
        let a = write(dir.path(), "a.csv", &format!("{HEADER}\n12345;2024-01-01 00:00:00;1,0;kWh\n"));
        let mut flow = flow();

        let form = expect_form(flow.step_user(Some(&dir.path().display().to_string())));
        assert_eq!(form.step, FlowStep::ChooseFile);
        assert_eq!(form.field, "filename");
        assert_eq!(form.choices, vec![a.clone(), b]);
        assert_eq!(flow.phase(), FlowPhase::AwaitFile);

        let result = flow.step_choose_file(Some(&a.display().to_string()));
        assert_eq!(
            result,
            FlowResult::CreateEntry(ConfigEntry {
                title: "12345".to_string(),
                data: EntryData { filename: a },
            })
        );
        assert_eq!(flow.phase(), FlowPhase::Done);
    }

    #[test]
    fn meter_id_failure_returns_to_folder_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "empty.csv", &format!("{HEADER}\n"));
        let mut flow = flow();

        expect_form(flow.step_user(Some(&dir.path().display().to_string())));
        let form = expect_form(flow.step_choose_file(Some(&path.display().to_string())));
        assert_eq!(form.step, FlowStep::User);
        assert_eq!(
            form.error,
            Some(format!("No meter id found in csv file '{}'", path.display()))
        );
        assert_eq!(flow.phase(), FlowPhase::AwaitFolder);

        // The folder was discarded, so the file step cannot be resumed.
        let form = expect_form(flow.step_choose_file(Some(&path.display().to_string())));
        assert_eq!(form.step, FlowStep::User);
    }

    #[test]
    fn unlisted_selection_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.csv", &format!("{HEADER}\n1;2024-01-01 00:00:00;1,0;kWh\n"));
        let mut flow = flow();

        expect_form(flow.step_user(Some(&dir.path().display().to_string())));
        let form = expect_form(flow.step_choose_file(Some("/etc/passwd")));
        assert_eq!(form.step, FlowStep::ChooseFile);
        assert!(form.error.is_some());
        assert_eq!(flow.phase(), FlowPhase::AwaitFile);
    }

    #[test]
    fn files_vanishing_before_listing_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.csv", &format!("{HEADER}\n1;2024-01-01 00:00:00;1,0;kWh\n"));
        let mut flow = flow();
        flow.folder = Some(validate_folder(&dir.path().display().to_string()).unwrap());
        fs::remove_file(path).unwrap();

        assert_eq!(
            flow.step_choose_file(None),
            FlowResult::Abort {
                reason: AbortReason::NoFilesFound
            }
        );
        assert_eq!(flow.phase(), FlowPhase::Aborted);
        assert_eq!(
            flow.step_user(Some("/tmp")),
            FlowResult::Abort {
                reason: AbortReason::FlowFinished
            }
        );
        assert_eq!(flow.phase(), FlowPhase::Aborted);
    }
}
