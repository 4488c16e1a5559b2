pub mod event;
pub mod metrics;
pub mod payment;
pub mod period;

pub use event::{PaymentEvent, PaymentEventType};
pub use metrics::{MetricsSnapshot, TimeWindow, TrendPoint};
pub use payment::{NewPayment, PaymentMethod, PaymentRecord, PaymentStatus};
pub use period::{InvalidPeriod, TrendPeriod};
