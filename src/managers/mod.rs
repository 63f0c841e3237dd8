pub mod backup;
pub mod health;
pub mod hooks;
pub mod logging;
pub mod notification;
pub mod retention;
pub mod scheduler;
