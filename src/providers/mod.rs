pub mod fixed;
pub mod online;
pub mod registry;
pub mod util;

pub use fixed::FixedRateSource;
pub use online::OnlineRateSource;
pub use registry::{ProviderSettings, RateRegistry};
