use anyhow::{bail, Result};
use energycsv_import::{
    config::AppConfig,
    observability,
    selector::{ConfigEntry, ConfigFlow, FlowResult, FlowStep},
};
use serde::Serialize;
use std::io::{self, BufRead, Write};

#[derive(Serialize)]
struct Entries<'a> {
    entries: [&'a ConfigEntry; 1],
}

fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load_or_default()?;
    let mut flow = ConfigFlow::new(cfg.integration, cfg.selector, cfg.import.columns.meter_id);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut stdout = io::stdout();

    let mut result = flow.step_user(None);
    loop {
        match result {
            FlowResult::ShowForm(form) => {
                if let Some(error) = &form.error {
                    eprintln!("error: {error}");
                }
                for (i, choice) in form.choices.iter().enumerate() {
                    writeln!(stdout, "  [{i}] {}", choice.display())?;
                }
                write!(stdout, "{}: ", form.field)?;
                stdout.flush()?;

                let Some(line) = lines.next().transpose()? else {
                    bail!("input closed before setup finished");
                };
                let answer = line.trim();

                result = match form.step {
                    FlowStep::User => flow.step_user(Some(answer)),
                    FlowStep::ChooseFile => {
                        // Accept either the listed index or the path itself.
                        let selection = answer
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| form.choices.get(i))
                            .map(|p| p.to_string_lossy().into_owned())
                            .unwrap_or_else(|| answer.to_string());
                        flow.step_choose_file(Some(&selection))
                    }
                };
            }
            FlowResult::CreateEntry(entry) => {
                writeln!(stdout, "\n# add to your energycsv configuration")?;
                write!(stdout, "{}", toml::to_string(&Entries { entries: [&entry] })?)?;
                return Ok(());
            }
            FlowResult::Abort { reason } => bail!("setup aborted: {reason}"),
        }
    }
}
