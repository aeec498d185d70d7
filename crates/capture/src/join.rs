//! Join-flow controller: a fixed, ordered list of declarative steps run
//! against the automation driver by one generic step runner.
//!
//! Only navigation is required. Every later step depends on how the meeting
//! is configured (waiting room, name prompt, permission dialog) and on the
//! interface version, so a step whose element never appears is recorded as
//! skipped and the flow moves on.

use std::{fmt, time::Duration};

use {
    serde::{Deserialize, Serialize},
    tokio::time::{Instant, timeout},
    tracing::{debug, info, warn},
};

use crate::{
    driver::{AutomationDriver, Locator, POLL_INTERVAL},
    error::{Error, Result},
    link::MeetingRef,
    schema::SchemaRegistry,
};

/// Camera/microphone permission dialog shown before the preview screen.
pub const PERMISSION_DIALOG_BUTTON: Locator =
    Locator::css("span.pepc-permission-dialog__footer-button");
pub const NAME_INPUT: Locator = Locator::css("input#input-for-name");
pub const PREVIEW_JOIN_BUTTON: Locator = Locator::css("button.preview-join-button");
pub const ADMIT_BUTTON: Locator = Locator::css("button.admit-button");

/// Default base URL of the meeting web client.
pub const DEFAULT_JOIN_BASE: &str = "https://zoom.us";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepName {
    Navigate,
    DismissEntryDialog,
    EnterDisplayName,
    AdmitFromWaitingRoom,
    OpenChatPanel,
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Navigate => "Navigate",
            Self::DismissEntryDialog => "DismissEntryDialog",
            Self::EnterDisplayName => "EnterDisplayName",
            Self::AdmitFromWaitingRoom => "AdmitFromWaitingRoom",
            Self::OpenChatPanel => "OpenChatPanel",
        };
        f.write_str(name)
    }
}

/// What a step does once its turn comes.
#[derive(Debug, Clone)]
pub enum StepAction {
    Navigate {
        url: String,
    },
    /// Click `control` each time it appears, up to `attempts` times, pausing
    /// `settle` after each click so a repeated dialog can render.
    Dismiss {
        control: Locator,
        attempts: u32,
        settle: Duration,
    },
    /// Fill `input`, wait for `submit` to enable, then click it.
    EnterName {
        input: Locator,
        submit: Locator,
        name: String,
    },
    Click {
        control: Locator,
    },
    /// Click the first of `controls` that appears. All controls are polled
    /// together, earlier entries winning when several are present.
    ClickFirst {
        controls: Vec<Locator>,
    },
}

/// One declarative join step.
#[derive(Debug, Clone)]
pub struct JoinStep {
    pub name: StepName,
    pub required: bool,
    /// Bound on the whole step, shared by every wait inside it.
    pub timeout: Duration,
    pub action: StepAction,
}

/// Result of the whole join flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Completed,
    /// Finished with these optional steps skipped.
    Degraded(Vec<StepName>),
}

impl JoinOutcome {
    pub fn skipped(&self) -> &[StepName] {
        match self {
            Self::Completed => &[],
            Self::Degraded(skipped) => skipped,
        }
    }
}

/// Per-step wait bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinTimeouts {
    pub navigate: Duration,
    pub dialog: Duration,
    /// Pause after each dialog dismissal.
    pub dialog_settle: Duration,
    /// How many times the entry dialog may need dismissing.
    pub dialog_attempts: u32,
    pub name_input: Duration,
    pub admit: Duration,
    pub chat_panel: Duration,
}

impl Default for JoinTimeouts {
    fn default() -> Self {
        Self {
            navigate: Duration::from_secs(30),
            dialog: Duration::from_secs(5),
            dialog_settle: Duration::from_millis(500),
            dialog_attempts: 2,
            name_input: Duration::from_secs(10),
            admit: Duration::from_secs(5),
            chat_panel: Duration::from_secs(5),
        }
    }
}

/// Everything needed to build the step list.
#[derive(Debug, Clone)]
pub struct JoinPlan {
    pub meeting: MeetingRef,
    pub display_name: String,
    pub join_base: String,
    pub timeouts: JoinTimeouts,
}

impl JoinPlan {
    pub fn new(meeting: MeetingRef, display_name: impl Into<String>) -> Self {
        Self {
            meeting,
            display_name: display_name.into(),
            join_base: DEFAULT_JOIN_BASE.to_string(),
            timeouts: JoinTimeouts::default(),
        }
    }
}

enum StepResult {
    Done,
    /// The step's element never appeared.
    NotPresent,
}

/// Drives the join steps in order against the driver.
pub struct JoinFlowController {
    steps: Vec<JoinStep>,
}

impl JoinFlowController {
    /// Build the fixed step sequence for `plan`. Chat-open controls come from
    /// `registry`, newest variant first.
    pub fn new(plan: &JoinPlan, registry: &SchemaRegistry) -> Result<Self> {
        let t = &plan.timeouts;
        let url = plan.meeting.join_url(&plan.join_base)?;
        let steps = vec![
            JoinStep {
                name: StepName::Navigate,
                required: true,
                timeout: t.navigate,
                action: StepAction::Navigate { url },
            },
            JoinStep {
                name: StepName::DismissEntryDialog,
                required: false,
                timeout: t.dialog,
                action: StepAction::Dismiss {
                    control: PERMISSION_DIALOG_BUTTON,
                    attempts: t.dialog_attempts,
                    settle: t.dialog_settle,
                },
            },
            JoinStep {
                name: StepName::EnterDisplayName,
                required: false,
                timeout: t.name_input,
                action: StepAction::EnterName {
                    input: NAME_INPUT,
                    submit: PREVIEW_JOIN_BUTTON,
                    name: plan.display_name.clone(),
                },
            },
            JoinStep {
                name: StepName::AdmitFromWaitingRoom,
                required: false,
                timeout: t.admit,
                action: StepAction::Click {
                    control: ADMIT_BUTTON,
                },
            },
            JoinStep {
                name: StepName::OpenChatPanel,
                required: false,
                timeout: t.chat_panel,
                action: StepAction::ClickFirst {
                    controls: registry.open_chat_locators(),
                },
            },
        ];
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[JoinStep] {
        &self.steps
    }

    /// Run every step in order. Optional steps that fail or find nothing are
    /// reported in [`JoinOutcome::Degraded`]; a failing required step aborts
    /// with [`Error::JoinFailure`].
    pub async fn run<D>(&self, driver: &D) -> Result<JoinOutcome>
    where
        D: AutomationDriver + ?Sized,
    {
        let mut skipped = Vec::new();

        for step in &self.steps {
            let start = Instant::now();
            debug!(step = %step.name, required = step.required, "join step starting");

            let result = run_step(driver, step).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(StepResult::Done) => {
                    info!(step = %step.name, elapsed_ms, "join step completed");
                },
                Ok(StepResult::NotPresent) if step.required => {
                    let err = Error::timeout(format!("{} element", step.name), step.timeout);
                    return Err(Error::join_failure(step.name, err));
                },
                Err(e) if step.required => {
                    return Err(Error::join_failure(step.name, e));
                },
                Ok(StepResult::NotPresent) => {
                    warn!(step = %step.name, elapsed_ms, "join step skipped: element not present");
                    skipped.push(step.name);
                },
                Err(e) => {
                    warn!(step = %step.name, elapsed_ms, error = %e, "join step skipped");
                    skipped.push(step.name);
                },
            }
        }

        if skipped.is_empty() {
            info!("joined meeting");
            Ok(JoinOutcome::Completed)
        } else {
            info!(skipped = ?skipped, "joined meeting with skipped steps");
            Ok(JoinOutcome::Degraded(skipped))
        }
    }
}

/// Time left before `deadline`, zero once it has passed.
fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Run one step. Every wait inside the step draws on a single deadline of
/// `step.timeout`, so a step never outlives its bound however many elements
/// it waits on.
async fn run_step<D>(driver: &D, step: &JoinStep) -> Result<StepResult>
where
    D: AutomationDriver + ?Sized,
{
    let deadline = Instant::now() + step.timeout;
    match step.action {
        StepAction::Navigate { ref url } => {
            timeout(step.timeout, driver.navigate(url))
                .await
                .map_err(|_| Error::timeout(format!("navigation to {url}"), step.timeout))??;
            Ok(StepResult::Done)
        },
        StepAction::Dismiss {
            ref control,
            attempts,
            settle,
        } => {
            let mut dismissed = 0;
            while dismissed < attempts {
                let Some(element) = driver.wait_for(control, remaining(deadline)).await? else {
                    break;
                };
                driver.click(&element).await?;
                dismissed += 1;
                debug!(step = %step.name, dismissed, "dismissed entry dialog");
                tokio::time::sleep_until((Instant::now() + settle).min(deadline)).await;
            }
            if dismissed == 0 {
                Ok(StepResult::NotPresent)
            } else {
                Ok(StepResult::Done)
            }
        },
        StepAction::EnterName {
            ref input,
            ref submit,
            ref name,
        } => {
            let Some(field) = driver.wait_for(input, remaining(deadline)).await? else {
                return Ok(StepResult::NotPresent);
            };
            driver.fill(&field, name).await?;

            let button = driver
                .wait_for(submit, remaining(deadline))
                .await?
                .ok_or_else(|| Error::timeout(submit, step.timeout))?;
            driver
                .wait_until_enabled(&button, remaining(deadline))
                .await?;
            driver.click(&button).await?;
            info!(display_name = %name, "submitted display name");
            Ok(StepResult::Done)
        },
        StepAction::Click { ref control } => {
            let Some(element) = driver.wait_for(control, remaining(deadline)).await? else {
                return Ok(StepResult::NotPresent);
            };
            driver.click(&element).await?;
            Ok(StepResult::Done)
        },
        StepAction::ClickFirst { ref controls } => loop {
            // Each poll checks every control in priority order.
            for control in controls {
                if let Some(element) = driver.locate(control).await? {
                    driver.click(&element).await?;
                    debug!(step = %step.name, control = %control, "clicked control");
                    return Ok(StepResult::Done);
                }
            }
            if Instant::now() >= deadline {
                return Ok(StepResult::NotPresent);
            }
            tokio::time::sleep_until((Instant::now() + POLL_INTERVAL).min(deadline)).await;
        },
    }
}
