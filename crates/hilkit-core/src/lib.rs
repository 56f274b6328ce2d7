//! hilkit-core: hardware-in-the-loop test support in Rust.
//!
//! Drives Yepkit USB relay devices and collects test results into banner
//! text, JUnit XML, HTML step reports and Xray JSON.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Yepkit constants and fixed-size report framing
//! - **Transport**: HID communication abstraction (nusb, mock)
//! - **Discovery**: enumerate-then-select device resolution
//! - **Yepkit**: YKUR relay board and YKUSH hub drivers
//! - **Result**: result observers and the fan-out proxy over them
//! - **Step report**: recorded assertions rendered to HTML
//! - **Xray**: reshaping of JUnit results into Xray imports
//!
//! # Example
//!
//! ```no_run
//! use hilkit_core::transport::NusbBackend;
//! use hilkit_core::yepkit::YkushHub;
//!
//! let hub = YkushHub::open(&NusbBackend, None)?;
//! hub.set_port_off(1)?;
//! assert!(hub.is_port_off(1)?);
//! # Ok::<(), hilkit_core::YepkitError>(())
//! ```

pub mod config;
pub mod discovery;
pub mod logging;
pub mod protocol;
pub mod result;
pub mod runner;
pub mod step_report;
pub mod transport;
pub mod xray;
pub mod yepkit;

// Re-exports for convenience
pub use config::{LogFileStrategy, RunConfig};
pub use logging::{LogSinks, init_tracing};
pub use result::{MultiTestResult, MultiTestResultBuilder, ResultStream, TestId, TestResult};
pub use runner::RunnerContext;
pub use step_report::{StepRecorder, StepReport, generate_step_report};
pub use transport::{MockTransport, NusbBackend, NusbTransport, TransportError};
pub use yepkit::{PortState, RelayTarget, YepkitError, YkurBoard, YkushHub};
