// Upstream measurement clients

pub mod datalab;
pub mod retry;
pub mod traits;

pub use datalab::DataLabClient;
pub use retry::RetryingClient;
pub use traits::MeasurementClient;
