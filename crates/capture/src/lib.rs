//! Guest join and passive chat capture for web meetings.
//!
//! The crate is driver-agnostic: [`join::JoinFlowController`] and
//! [`capture::ChatCaptureEngine`] talk to the browser only through the
//! [`driver::AutomationDriver`] trait and hand messages to an
//! [`sink::EventSink`].
//!
//! # Example
//!
//! ```ignore
//! use chatwatch_capture::{ChatCaptureEngine, JoinFlowController, JoinPlan, SchemaRegistry};
//!
//! let meeting = chatwatch_capture::link::parse("https://zoom.us/j/123456789?pwd=abc123")?;
//! let registry = SchemaRegistry::builtin();
//! let outcome = JoinFlowController::new(&JoinPlan::new(meeting, "ChatBot"), &registry)?
//!     .run(&driver)
//!     .await?;
//!
//! let mut engine = ChatCaptureEngine::new(registry, sink);
//! engine.start(&driver).await?;
//! ```

pub mod capture;
pub mod driver;
pub mod error;
pub mod join;
pub mod link;
pub mod schema;
pub mod sink;
pub mod types;

#[cfg(test)]
mod testing;

pub use {
    capture::{ChatCaptureEngine, SeenSet},
    driver::{AutomationDriver, ChangeBatch, ChangeStream, ElementSnapshot, Locator, Probe},
    error::{Error, Result},
    join::{JoinFlowController, JoinOutcome, JoinPlan, JoinTimeouts, StepName},
    link::MeetingRef,
    schema::{SchemaRegistry, SchemaVariant},
    sink::{ChannelSink, EventSink},
    types::{ChatMessage, ChatMessageCandidate, DedupKey},
};
