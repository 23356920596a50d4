// Shared retry-capacity accounting: the bucket, failure pricing, admission
pub mod atomic;
pub mod cost;
pub mod request;

pub use atomic::{Acquisition, AtomicCapacity};
pub use cost::{FailureCostCalculator, FailureCostCalculatorBuilder};
pub use request::{
    RequestCapacity, TokenBucketCapacity, TokenBucketCapacityBuilder, UnlimitedCapacity,
};
