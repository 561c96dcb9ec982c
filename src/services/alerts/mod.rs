mod alert;
mod channel;
mod router;
mod throttle;

pub use alert::{Alert, AlertOptions, Category, Severity};
pub use channel::{ChannelError, ChatBotChannel, DashboardChannel, EmailChannel, NotificationChannel, WebhookChannel};
pub use router::{AlertFilter, AlertRouter};
pub use throttle::{Throttle, ThrottleConfig};
