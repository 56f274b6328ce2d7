//! Test result observers.
//!
//! - `banner`: console output wrapped in banners
//! - `xml`: JUnit XML reports
//! - `multi`: fan-out of every event to several backends, with per-test log files

pub mod banner;
pub mod ledger;
pub mod multi;
pub mod stream;
pub mod test_id;
pub mod traits;
pub mod xml;

pub use banner::BannerTestResult;
pub use ledger::{ResultLedger, TestTiming};
pub use multi::{
    BackendConfig, BannerConfig, MultiTestResult, MultiTestResultBuilder, ResultArgs, XmlConfig,
};
pub use stream::{MultiFileSink, ResultStream, SharedBuffer};
pub use test_id::{SubTest, TestError, TestId};
pub use traits::{ReportError, ReportGenerator, TestResult};
pub use xml::XmlTestResult;
