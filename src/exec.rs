use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use crate::command::Invocation;
use crate::error::HarnessError;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub trait AnalysisExecutor: Send + Sync {
    fn execute(&self, invocation: &Invocation) -> Result<(), HarnessError>;
}

#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    timeout: Option<Duration>,
}

impl SystemExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn wait(&self, child: &mut Child, program: &str) -> Result<ExitStatus, HarnessError> {
        let spawn_error = |err: std::io::Error| HarnessError::InvocationSpawn {
            program: program.to_string(),
            message: err.to_string(),
        };

        let Some(timeout) = self.timeout else {
            return child.wait().map_err(spawn_error);
        };

        let start = Instant::now();
        loop {
            if let Some(status) = child.try_wait().map_err(spawn_error)? {
                return Ok(status);
            }
            if start.elapsed() >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(HarnessError::InvocationTimeout {
                    program: program.to_string(),
                    seconds: timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl AnalysisExecutor for SystemExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<(), HarnessError> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .spawn()
            .map_err(|err| HarnessError::InvocationSpawn {
                program: invocation.program.clone(),
                message: err.to_string(),
            })?;
        let status = self.wait(&mut child, &invocation.program)?;
        if status.success() {
            return Ok(());
        }
        Err(HarnessError::InvocationStatus {
            program: invocation.program.clone(),
            status: status.to_string(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::AnalysisKind;

    fn sh(script: &str) -> Invocation {
        Invocation {
            kind: AnalysisKind::Overview,
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[test]
    fn zero_exit_is_ok() {
        SystemExecutor::new().execute(&sh("exit 0")).unwrap();
    }

    #[test]
    fn non_zero_exit_is_reported() {
        let err = SystemExecutor::new().execute(&sh("exit 3")).unwrap_err();
        assert_matches!(err, HarnessError::InvocationStatus { .. });
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let invocation = Invocation {
            kind: AnalysisKind::Overview,
            program: "kira-ah-definitely-missing".to_string(),
            args: Vec::new(),
        };
        let err = SystemExecutor::new().execute(&invocation).unwrap_err();
        assert_matches!(err, HarnessError::InvocationSpawn { .. });
    }

    #[test]
    fn slow_program_times_out() {
        let executor = SystemExecutor::with_timeout(Some(Duration::from_millis(300)));
        let err = executor.execute(&sh("sleep 5")).unwrap_err();
        assert_matches!(err, HarnessError::InvocationTimeout { .. });
    }
}
