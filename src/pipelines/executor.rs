//! # Sequential Step Execution
//!
//! Runs the ordered step list strictly one at a time with fail-fast
//! semantics: the first failing step aborts the whole run, and nothing that
//! earlier steps wrote is rolled back. Sequential order is the sole
//! scheduling guarantee; steps hand results to each other only through
//! well-known filenames, so there is exactly one writer at a time by
//! construction.
//!
//! The external world is reached only through the [`StepRunner`] trait, so
//! tests substitute a fake runner and never spawn a process.

use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Child, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{RarticError, Result};
use super::command::Step;

/// External collaborator that runs one fully formed step.
///
/// `Ok(true)` means every stage of the step succeeded, `Ok(false)` a clean
/// non-zero exit, `Err` a spawn or wait failure. The executor treats the
/// last two identically.
pub trait StepRunner {
    fn run(&mut self, step: &Step) -> io::Result<bool>;
}

/// Runs steps as real child processes, wiring each stage's stdout into the
/// next stage's stdin and honouring the step's file redirections.
pub struct ShellRunner;

impl StepRunner for ShellRunner {
    fn run(&mut self, step: &Step) -> io::Result<bool> {
        let stages = step.stages();
        let mut children: Vec<Child> = Vec::with_capacity(stages.len());

        for (i, stage) in stages.iter().enumerate() {
            let mut command = std::process::Command::new(stage.program());
            command.args(stage.arguments());

            if i == 0 {
                if let Some(path) = step.stdin() {
                    command.stdin(Stdio::from(File::open(path)?));
                }
                if let Some(path) = step.stderr() {
                    command.stderr(Stdio::from(File::create(path)?));
                }
            } else if let Some(previous) = children.last_mut() {
                if let Some(upstream) = previous.stdout.take() {
                    command.stdin(Stdio::from(upstream));
                }
            }

            let last = i + 1 == stages.len();
            if !last {
                command.stdout(Stdio::piped());
            } else if let Some(path) = step.stdout() {
                command.stdout(Stdio::from(File::create(path)?));
            }

            children.push(command.spawn()?);
        }

        // Every stage must succeed; a failed upstream aligner is not masked
        // by a successful downstream sort.
        let mut ok = true;
        for mut child in children {
            ok &= child.wait()?.success();
        }
        Ok(ok)
    }
}

/// Append-only per-run log: one line per step, with the wall-clock duration
/// when the step was executed and no duration in dry-run mode.
pub struct RunLog {
    out: io::BufWriter<File>,
}

impl RunLog {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            out: io::BufWriter::new(File::create(path)?),
        })
    }

    /// Record an executed step. The line is flushed immediately so the log
    /// survives a later step aborting the process.
    pub fn record(&mut self, step: &Step, elapsed: Duration) -> Result<()> {
        use io::Write;
        writeln!(self.out, "{step}\t{}", elapsed.as_secs_f64())?;
        self.out.flush()?;
        Ok(())
    }

    /// Record a step in dry-run mode: text only, no timing.
    pub fn record_dry(&mut self, step: &Step) -> Result<()> {
        use io::Write;
        writeln!(self.out, "{step}")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Run `steps` in order against `runner`, timing each step and writing the
/// run log as execution proceeds. In dry-run mode every step is printed and
/// logged but the runner is never invoked.
pub fn execute<R: StepRunner>(
    steps: &[Step],
    runner: &mut R,
    log: &mut RunLog,
    dry_run: bool,
) -> Result<()> {
    for (index, step) in steps.iter().enumerate() {
        eprintln!("Running: {step}");
        if dry_run {
            log.record_dry(step)?;
            continue;
        }

        let started = Instant::now();
        let ok = match runner.run(step) {
            Ok(ok) => ok,
            Err(e) => {
                debug!(step = %step, error = %e, "step did not start cleanly");
                false
            }
        };
        if !ok && !step.is_best_effort() {
            return Err(RarticError::StepFailed {
                position: index + 1,
                step: step.to_string(),
            });
        }
        log.record(step, started.elapsed())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::command::Command;
    use std::fs;

    /// Fake collaborator: scripted outcomes, records what was invoked.
    struct ScriptedRunner {
        outcomes: Vec<bool>,
        invoked: Vec<String>,
    }

    impl ScriptedRunner {
        fn new(outcomes: &[bool]) -> Self {
            Self {
                outcomes: outcomes.to_vec(),
                invoked: Vec::new(),
            }
        }
    }

    impl StepRunner for ScriptedRunner {
        fn run(&mut self, step: &Step) -> io::Result<bool> {
            let outcome = self.outcomes[self.invoked.len()];
            self.invoked.push(step.to_string());
            Ok(outcome)
        }
    }

    fn numbered_steps(n: usize) -> Vec<Step> {
        (1..=n)
            .map(|i| Step::cmd(Command::new("tool").arg(format!("step{i}"))))
            .collect()
    }

    fn log_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .expect("run log exists")
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn failure_aborts_without_attempting_later_steps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log_path = dir.path().join("sample.minion.log.txt");
        let mut log = RunLog::create(&log_path).expect("log");
        let mut runner = ScriptedRunner::new(&[true, true, false, true, true]);

        let steps = numbered_steps(5);
        let err = execute(&steps, &mut runner, &mut log, false).expect_err("step 3 fails");

        match err {
            RarticError::StepFailed { position, ref step } => {
                assert_eq!(position, 3);
                assert!(step.contains("step3"), "failing step surfaced: {step}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.invoked.len(), 3, "steps 4 and 5 never attempted");

        // Only the two successful steps were logged, both with durations.
        let lines = log_lines(&log_path);
        assert_eq!(lines.len(), 2);
        for line in &lines {
            let mut fields = line.split('\t');
            fields.next().expect("step text");
            let duration = fields.next().expect("duration column");
            duration.parse::<f64>().expect("duration parses");
        }
    }

    #[test]
    fn dry_run_logs_every_step_and_never_invokes_the_runner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log_path = dir.path().join("sample.minion.log.txt");
        let mut log = RunLog::create(&log_path).expect("log");
        let mut runner = ScriptedRunner::new(&[]);

        let steps = numbered_steps(4);
        execute(&steps, &mut runner, &mut log, true).expect("dry run succeeds");

        assert!(runner.invoked.is_empty(), "collaborator untouched");
        let lines = log_lines(&log_path);
        assert_eq!(lines.len(), 4);
        assert!(
            lines.iter().all(|l| !l.contains('\t')),
            "no duration column in dry-run lines"
        );
    }

    #[test]
    fn best_effort_failure_does_not_abort() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log_path = dir.path().join("sample.minion.log.txt");
        let mut log = RunLog::create(&log_path).expect("log");
        let mut runner = ScriptedRunner::new(&[false, true]);

        let steps = vec![
            Step::cmd(Command::new("snp-sites").args(["-v", "s.mafft.out.fasta"]))
                .stdout_to("s.final.vcf")
                .best_effort(),
            Step::cmd(Command::new("tool").arg("after")),
        ];
        execute(&steps, &mut runner, &mut log, false).expect("run continues");
        assert_eq!(runner.invoked.len(), 2);
        assert_eq!(log_lines(&log_path).len(), 2);
    }

    #[test]
    fn shell_runner_reports_missing_programs_as_errors() {
        let step = Step::cmd(Command::new("rartic-no-such-tool-on-path").arg("x"));
        let mut runner = ShellRunner;
        assert!(runner.run(&step).is_err());
    }

    #[test]
    fn shell_runner_executes_a_redirected_pipe_chain() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        fs::write(&input, "b\na\nb\n").expect("input");

        let step = Step::cmd(Command::new("sort"))
            .stdin_from(input.display().to_string())
            .pipe(Command::new("uniq"))
            .stdout_to(output.display().to_string());

        let mut runner = ShellRunner;
        let ok = runner.run(&step).expect("spawns");
        assert!(ok);
        assert_eq!(fs::read_to_string(&output).expect("output"), "a\nb\n");
    }
}
